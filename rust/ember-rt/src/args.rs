//! Argument checking for native routines.

use crate::env::Env;
use crate::table::Table;
use crate::value::Value;
use crate::vm::VmError;
use std::cell::RefCell;
use std::rc::Rc;

pub fn fix_arity(name: &str, args: &[Value], n: usize) -> Result<(), VmError> {
    arity(name, args, n, Some(n))
}

pub fn arity(name: &str, args: &[Value], min: usize, max: Option<usize>) -> Result<(), VmError> {
    let got = args.len();
    let ok = got >= min && !matches!(max, Some(max) if got > max);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("{}", min),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };
    Err(VmError::Arity {
        name: name.to_string(),
        expected,
        got,
    })
}

pub fn number(args: &[Value], i: usize) -> Result<f64, VmError> {
    args[i]
        .as_number()
        .ok_or_else(|| VmError::type_error("number", &args[i]))
}

pub fn integer(args: &[Value], i: usize) -> Result<i64, VmError> {
    match args[i] {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => Ok(n as i64),
        ref other => Err(VmError::type_error("integer", other)),
    }
}

pub fn index(args: &[Value], i: usize) -> Result<usize, VmError> {
    args[i]
        .as_index()
        .ok_or_else(|| VmError::type_error("non-negative integer", &args[i]))
}

/// A non-negative integer usable as an array or buffer length.
pub fn length(args: &[Value], i: usize) -> Result<usize, VmError> {
    crate::vm::ops::check_length(index(args, i)?)
}

/// Bytes of a string, symbol, keyword, or buffer.
pub fn bytes(args: &[Value], i: usize) -> Result<Vec<u8>, VmError> {
    match &args[i] {
        Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => Ok(s.to_vec()),
        Value::Buffer(b) => Ok(b.borrow().clone()),
        other => Err(VmError::type_error("string", other)),
    }
}

pub fn string(args: &[Value], i: usize) -> Result<String, VmError> {
    Ok(String::from_utf8_lossy(&bytes(args, i)?).into_owned())
}

pub fn table(args: &[Value], i: usize) -> Result<Rc<RefCell<Table>>, VmError> {
    match &args[i] {
        Value::Table(t) => Ok(t.clone()),
        other => Err(VmError::type_error("table", other)),
    }
}

pub fn array(args: &[Value], i: usize) -> Result<Rc<RefCell<Vec<Value>>>, VmError> {
    match &args[i] {
        Value::Array(a) => Ok(a.clone()),
        other => Err(VmError::type_error("array", other)),
    }
}

pub fn buffer(args: &[Value], i: usize) -> Result<Rc<RefCell<Vec<u8>>>, VmError> {
    match &args[i] {
        Value::Buffer(b) => Ok(b.clone()),
        other => Err(VmError::type_error("buffer", other)),
    }
}

/// Elements of an array or tuple.
pub fn indexed(args: &[Value], i: usize) -> Result<Vec<Value>, VmError> {
    args[i]
        .as_indexed()
        .ok_or_else(|| VmError::type_error("array or tuple", &args[i]))
}

/// Optional environment argument; `nil` or a missing argument gives `None`.
pub fn opt_env(args: &[Value], i: usize) -> Result<Option<Env>, VmError> {
    match args.get(i) {
        None | Some(Value::Nil) => Ok(None),
        Some(v) => Env::from_value(v)
            .map(Some)
            .ok_or_else(|| VmError::type_error("table", v)),
    }
}

/// Pairs `k1 v1 k2 v2 ...` for the dictionary constructors.
pub fn pairs(args: &[Value]) -> Result<Vec<(Value, Value)>, VmError> {
    if args.len() % 2 != 0 {
        return Err(VmError::Runtime("expected even number of arguments".into()));
    }
    Ok(args
        .chunks_exact(2)
        .map(|kv| (kv[0].clone(), kv[1].clone()))
        .collect())
}

pub fn runtime(msg: impl Into<String>) -> VmError {
    VmError::Runtime(msg.into())
}
