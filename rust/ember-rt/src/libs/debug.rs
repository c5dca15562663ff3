//! Introspection of routines.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn cfun_intrinsic(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("debug/intrinsic", args, 1)?;
    Ok(match &args[0] {
        Value::Function(f) => f
            .intrinsic()
            .map(|i| Value::keyword(i.name()))
            .unwrap_or_default(),
        _ => Value::Nil,
    })
}

fn cfun_arity(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("debug/arity", args, 1)?;
    match &args[0] {
        Value::Function(f) => {
            let arity = f.def.arity;
            Ok(Value::tuple(vec![
                Value::Number(arity.min as f64),
                arity.max.map(|m| Value::Number(m as f64)).unwrap_or_default(),
            ]))
        }
        other => Err(VmError::type_error("function", other)),
    }
}

const ENTRIES: &[Entry] = &[
    ("debug/intrinsic", cfun_intrinsic,
        "(debug/intrinsic f)\n\nReturns the intrinsic tag of a primitive routine as a keyword, or nil when f is not one."),
    ("debug/arity", cfun_arity,
        "(debug/arity f)\n\nReturns the tuple (min max) of argument counts f accepts. max is nil for variadic functions."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
