//! A VM together with the root environment it was built with.

use crate::config::RuntimeConfig;
use crate::corelib::bootstrap::Bootstrap;
use crate::corelib::{self, BootError};
use crate::env::Env;
use crate::eval::Evaluator;
use crate::value::Value;
use crate::vm::{Vm, VmError};

/// Owns the root environment for as long as the runtime lives. The VM
/// roots it as well, so values reachable from it are never collected.
///
/// The environment binds itself as `_env`, which is a reference cycle.
/// Dropping the runtime removes that binding so the environment is freed;
/// cycles user code builds through `_env` are not broken.
pub struct Runtime {
    vm: Vm,
    env: Env,
}

impl Runtime {
    /// Builds the core environment with the default bootstrap.
    pub fn new(config: RuntimeConfig) -> Result<Self, BootError> {
        let mut vm = Vm::new(config);
        let env = corelib::try_core_env(&mut vm, None)?;
        Ok(Self { vm, env })
    }

    /// Builds the core environment with an explicit bootstrap.
    pub fn with_bootstrap(config: RuntimeConfig, bootstrap: &dyn Bootstrap) -> Result<Self, BootError> {
        Self::from_vm(Vm::new(config), bootstrap)
    }

    /// Like [`Runtime::with_bootstrap`], for a VM whose I/O has already been
    /// redirected.
    pub fn from_vm(mut vm: Vm, bootstrap: &dyn Bootstrap) -> Result<Self, BootError> {
        let env = corelib::native_env(&mut vm, None)?;
        let env = bootstrap.finish(&mut vm, env)?;
        Ok(Self { vm, env })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn vm(&mut self) -> &mut Vm {
        &mut self.vm
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.env.lookup(name)
    }

    /// Calls the routine bound to `name`.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, VmError> {
        let f = self
            .lookup(name)
            .ok_or_else(|| VmError::Runtime(format!("unknown symbol {}", name)))?;
        self.vm.call(&f, args)
    }

    /// Evaluates source text in the root environment.
    pub fn eval_str(&mut self, src: &str) -> Result<Value, VmError> {
        Evaluator::new(&mut self.vm, self.env.clone(), "<eval>").eval_source(src)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.env.undef("_env");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corelib::bootstrap::SourceBootstrap;

    fn runtime() -> Runtime {
        Runtime::with_bootstrap(RuntimeConfig::default(), &SourceBootstrap).unwrap()
    }

    #[test]
    fn test_boot_source_routines() {
        let mut rt = runtime();
        let xs = Value::tuple(vec![1.into(), 2.into(), 3.into()]);
        assert_eq!(rt.call("sum", &[xs.clone()]).unwrap(), Value::Number(6.0));
        assert_eq!(rt.call("last", &[xs.clone()]).unwrap(), Value::Number(3.0));
        assert_eq!(rt.call("last", &[Value::tuple(vec![])]).unwrap(), Value::Nil);
        let inc = rt.lookup("inc").unwrap();
        let mapped = rt.call("map", &[inc, xs.clone()]).unwrap();
        assert_eq!(mapped.describe(), "@[2 3 4]");
        let odd = rt.lookup("odd?").unwrap();
        assert_eq!(rt.call("filter", &[odd, xs.clone()]).unwrap().describe(), "@[1 3]");
        let plus = rt.lookup("+").unwrap();
        assert_eq!(rt.call("reduce", &[plus, 10.into(), xs]).unwrap(), Value::Number(16.0));
    }

    #[test]
    fn test_eval_str_in_root_env() {
        let mut rt = runtime();
        assert_eq!(rt.eval_str("(not nil)").unwrap(), Value::Boolean(true));
        assert_eq!(rt.eval_str("(keys {:a 1})").unwrap().describe(), "@[:a]");
    }

    #[test]
    fn test_drop_frees_the_environment() {
        let rt = runtime();
        assert!(rt.lookup("_env").is_some());
        let table = std::rc::Rc::downgrade(rt.env().table());
        drop(rt);
        assert!(table.upgrade().is_none());
    }

    #[test]
    fn test_boot_definitions_carry_source_locations() {
        let rt = runtime();
        let b = rt.env().binding("identity").unwrap();
        let src = b.source.unwrap();
        assert_eq!(src.file, "boot/core.ember");
        assert!(src.line > 1);
    }
}
