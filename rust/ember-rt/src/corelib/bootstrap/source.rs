use super::Bootstrap;
use crate::corelib::BootError;
use crate::env::Env;
use crate::eval::Evaluator;
use crate::reader;
use crate::vm::Vm;

/// The standard library written in ember itself.
pub const BOOT_SOURCE: &str = include_str!("../../../boot/core.ember");

const BOOT_FILE: &str = "boot/core.ember";

/// Evaluates the boot source against the partial environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceBootstrap;

impl Bootstrap for SourceBootstrap {
    fn finish(&self, vm: &mut Vm, env: Env) -> Result<Env, BootError> {
        let forms = reader::parse_all(BOOT_SOURCE)?;
        let before = env.len();
        let mut evaluator = Evaluator::new(vm, env.clone(), BOOT_FILE);
        for form in &forms {
            evaluator
                .eval(form)
                .map_err(|source| BootError::Eval { source })?;
        }
        tracing::debug!(forms = forms.len(), added = env.len() - before, "boot source evaluated");
        Ok(env)
    }
}
