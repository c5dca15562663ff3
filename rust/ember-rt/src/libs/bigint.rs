//! Arbitrary-precision integers as an abstract type.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::{Abstract, Value};
use crate::vm::{Vm, VmError};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use std::any::Any;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmberBigInt(pub BigInt);

impl Abstract for EmberBigInt {
    fn type_name(&self) -> &'static str {
        "core/bigint"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn to_bigint(v: &Value) -> Result<BigInt, VmError> {
    match v {
        Value::Abstract(a) => a
            .as_any()
            .downcast_ref::<EmberBigInt>()
            .map(|b| b.0.clone())
            .ok_or_else(|| VmError::type_error("core/bigint", v)),
        Value::Number(n) if n.fract() == 0.0 => {
            BigInt::from_f64(*n).ok_or_else(|| VmError::type_error("integer", v))
        }
        Value::String(s) => std::str::from_utf8(s)
            .ok()
            .and_then(|s| s.parse::<BigInt>().ok())
            .ok_or_else(|| args::runtime("invalid integer literal")),
        other => Err(VmError::type_error("integer", other)),
    }
}

fn wrap(b: BigInt) -> Value {
    Value::Abstract(Rc::new(EmberBigInt(b)))
}

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("bigint/new", args, 1)?;
    Ok(wrap(to_bigint(&args[0])?))
}

macro_rules! fold {
    ($fname:ident, $name:literal, $seed:expr, $op:tt) => {
        fn $fname(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
            args::arity($name, args, 1, None)?;
            let mut acc = to_bigint(&args[0])?;
            if args.len() == 1 {
                acc = BigInt::from($seed) $op acc;
            }
            for v in &args[1..] {
                acc = acc $op to_bigint(v)?;
            }
            Ok(wrap(acc))
        }
    };
}

fold!(cfun_add, "bigint/add", 0, +);
fold!(cfun_sub, "bigint/sub", 0, -);
fold!(cfun_mul, "bigint/mul", 1, *);

fn cfun_to_string(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("bigint/to-string", args, 1)?;
    Ok(Value::string(to_bigint(&args[0])?.to_string()))
}

fn cfun_to_number(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("bigint/to-number", args, 1)?;
    Ok(Value::Number(to_bigint(&args[0])?.to_f64().unwrap_or(f64::NAN)))
}

const ENTRIES: &[Entry] = &[
    ("bigint/new", cfun_new,
        "(bigint/new x)\n\nCreates an arbitrary-precision integer from an integral number or a decimal string."),
    ("bigint/add", cfun_add,
        "(bigint/add & xs)\n\nReturns the sum of xs as a bigint."),
    ("bigint/sub", cfun_sub,
        "(bigint/sub & xs)\n\nSubtracts the rest of xs from the first. With one argument, negates it."),
    ("bigint/mul", cfun_mul,
        "(bigint/mul & xs)\n\nReturns the product of xs as a bigint."),
    ("bigint/to-string", cfun_to_string,
        "(bigint/to-string x)\n\nReturns the decimal representation of x."),
    ("bigint/to-number", cfun_to_number,
        "(bigint/to-number x)\n\nConverts x to the nearest number. Precision is lost above 2^53."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
