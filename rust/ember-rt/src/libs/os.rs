//! Process environment, clocks, and exit.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use once_cell::sync::Lazy;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static START: Lazy<Instant> = Lazy::new(Instant::now);

fn cfun_getenv(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("os/getenv", args, 1)?;
    let key = args::string(args, 0)?;
    Ok(std::env::var_os(key)
        .map(|v| Value::string(v.to_string_lossy().as_bytes()))
        .unwrap_or_default())
}

fn cfun_time(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("os/time", args, 0)?;
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    Ok(Value::Number(secs as f64))
}

fn cfun_clock(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("os/clock", args, 0)?;
    Ok(Value::Number(START.elapsed().as_secs_f64()))
}

fn cfun_which(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("os/which", args, 0)?;
    Ok(Value::keyword(std::env::consts::OS))
}

fn cfun_exit(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("os/exit", args, 0, Some(1))?;
    let code = match args.first() {
        None | Some(Value::Nil) => 0,
        Some(_) => args::integer(args, 0)? as i32,
    };
    let _ = vm.output().flush();
    tracing::debug!(code, "exit requested");
    std::process::exit(code)
}

const ENTRIES: &[Entry] = &[
    ("os/getenv", cfun_getenv,
        "(os/getenv variable)\n\nGet the string value of an environment variable, or nil if it is not set."),
    ("os/time", cfun_time,
        "(os/time)\n\nGet the current time in seconds since the Unix epoch."),
    ("os/clock", cfun_clock,
        "(os/clock)\n\nReturn the number of seconds since the runtime started as a real number. Useful for measuring elapsed time."),
    ("os/which", cfun_which,
        "(os/which)\n\nCheck the current operating system. Returns a keyword such as :linux, :macos or :windows."),
    ("os/exit", cfun_exit,
        "(os/exit &opt x)\n\nExit from the runtime with the given status code. If x is not an integer, exits with status 0."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    Lazy::force(&START);
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getenv_and_which() {
        let mut vm = Vm::default();
        assert_eq!(
            cfun_getenv(&mut vm, &["EMBER_SURELY_UNSET_VARIABLE".into()]).unwrap(),
            Value::Nil
        );
        assert_eq!(
            cfun_which(&mut vm, &[]).unwrap(),
            Value::keyword(std::env::consts::OS)
        );
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut vm = Vm::default();
        let a = cfun_clock(&mut vm, &[]).unwrap().as_number().unwrap();
        let b = cfun_clock(&mut vm, &[]).unwrap().as_number().unwrap();
        assert!(b >= a);
    }
}
