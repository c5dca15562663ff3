//! Operand semantics shared by the dispatch loop and the native libraries.

use super::VmError;
use crate::value::{format_number, Value};
use ember_core::OpCode;
use std::cmp::Ordering;

/// Largest length an array or buffer may be created with or grown to.
/// Requests past it fail with a runtime error instead of exhausting memory.
pub const MAX_LENGTH: usize = 1 << 24;

/// Rejects lengths above [`MAX_LENGTH`].
pub fn check_length(len: usize) -> Result<usize, VmError> {
    if len > MAX_LENGTH {
        return Err(VmError::Runtime(format!(
            "length {} exceeds the maximum of {}",
            len, MAX_LENGTH
        )));
    }
    Ok(len)
}

fn number(v: &Value) -> Result<f64, VmError> {
    v.as_number().ok_or_else(|| VmError::type_error("number", v))
}

fn int32(v: &Value) -> Result<i32, VmError> {
    v.as_int32().ok_or_else(|| VmError::type_error("32-bit integer", v))
}

/// `add`, `sub`, `mul`, `div`.
pub fn arith(op: OpCode, x: &Value, y: &Value) -> Result<Value, VmError> {
    let (x, y) = (number(x)?, number(y)?);
    let n = match op {
        OpCode::Add => x + y,
        OpCode::Subtract => x - y,
        OpCode::Multiply => x * y,
        OpCode::Divide => x / y,
        other => return Err(VmError::Runtime(format!("{} is not arithmetic", other.mnemonic()))),
    };
    Ok(Value::Number(n))
}

/// Bitwise operators over 32-bit integers. Shift counts wrap modulo 32.
pub fn bitwise(op: OpCode, x: &Value, y: &Value) -> Result<Value, VmError> {
    let (x, y) = (int32(x)?, int32(y)?);
    let n = match op {
        OpCode::BAnd => (x & y) as f64,
        OpCode::BOr => (x | y) as f64,
        OpCode::BXor => (x ^ y) as f64,
        OpCode::ShiftLeft => x.wrapping_shl(y as u32) as f64,
        OpCode::ShiftRight => x.wrapping_shr(y as u32) as f64,
        OpCode::ShiftRightUnsigned => (x as u32).wrapping_shr(y as u32) as f64,
        other => return Err(VmError::Runtime(format!("{} is not bitwise", other.mnemonic()))),
    };
    Ok(Value::Number(n))
}

pub fn bnot(x: &Value) -> Result<Value, VmError> {
    Ok(Value::Number(!int32(x)? as f64))
}

/// Numeric comparisons; both operands must be numbers.
pub fn numeric_compare(op: OpCode, x: &Value, y: &Value) -> Result<Value, VmError> {
    let (x, y) = (number(x)?, number(y)?);
    let b = match op {
        OpCode::NumericGreaterThan => x > y,
        OpCode::NumericGreaterThanEqual => x >= y,
        OpCode::NumericLessThan => x < y,
        OpCode::NumericLessThanEqual => x <= y,
        OpCode::NumericEqual => x == y,
        other => return Err(VmError::Runtime(format!("{} is not a comparison", other.mnemonic()))),
    };
    Ok(Value::Boolean(b))
}

/// Total-order comparisons over any values.
pub fn order_compare(op: OpCode, x: &Value, y: &Value) -> Value {
    let b = match op {
        OpCode::GreaterThan => x.compare(y) == Ordering::Greater,
        OpCode::LessThan => x.compare(y) == Ordering::Less,
        _ => x == y,
    };
    Value::Boolean(b)
}

fn byte_at(bytes: &[u8], index: usize) -> Value {
    bytes
        .get(index)
        .map(|b| Value::Number(*b as f64))
        .unwrap_or(Value::Nil)
}

/// `ds[key]`. Out-of-range indices and missing keys yield nil.
pub fn get(ds: &Value, key: &Value) -> Result<Value, VmError> {
    match ds {
        Value::Table(t) => Ok(t.borrow().get(key)),
        Value::Struct(s) => Ok(s.get(key)),
        Value::Array(_) | Value::Tuple(_) | Value::String(_) | Value::Symbol(_)
        | Value::Keyword(_) | Value::Buffer(_) => {
            let index = key
                .as_index()
                .ok_or_else(|| VmError::type_error("integer index", key))?;
            get_index(ds, index)
        }
        other => Err(VmError::type_error("data structure", other)),
    }
}

pub fn get_index(ds: &Value, index: usize) -> Result<Value, VmError> {
    match ds {
        Value::Array(a) => Ok(a.borrow().get(index).cloned().unwrap_or(Value::Nil)),
        Value::Tuple(t) => Ok(t.get(index).cloned().unwrap_or(Value::Nil)),
        Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => Ok(byte_at(s, index)),
        Value::Buffer(b) => Ok(byte_at(&b.borrow(), index)),
        Value::Table(_) | Value::Struct(_) => get(ds, &Value::Number(index as f64)),
        other => Err(VmError::type_error("data structure", other)),
    }
}

/// `ds[key] = value`. Arrays and buffers grow to fit the index.
pub fn put(ds: &Value, key: &Value, value: Value) -> Result<(), VmError> {
    match ds {
        Value::Table(t) => {
            if key.is_nil() {
                return Err(VmError::Runtime("table key cannot be nil".into()));
            }
            t.borrow_mut().put(key.clone(), value);
            Ok(())
        }
        Value::Array(a) => {
            let index = key
                .as_index()
                .ok_or_else(|| VmError::type_error("integer index", key))?;
            let mut a = a.borrow_mut();
            if index >= a.len() {
                a.resize(check_length(index + 1)?, Value::Nil);
            }
            a[index] = value;
            Ok(())
        }
        Value::Buffer(b) => {
            let index = key
                .as_index()
                .ok_or_else(|| VmError::type_error("integer index", key))?;
            let byte = value
                .as_int32()
                .ok_or_else(|| VmError::type_error("integer byte", &value))?;
            let mut b = b.borrow_mut();
            if index >= b.len() {
                b.resize(check_length(index + 1)?, 0);
            }
            b[index] = byte as u8;
            Ok(())
        }
        other => Err(VmError::type_error("mutable data structure", other)),
    }
}

pub fn length(ds: &Value) -> Result<usize, VmError> {
    match ds {
        Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => Ok(s.len()),
        Value::Buffer(b) => Ok(b.borrow().len()),
        Value::Array(a) => Ok(a.borrow().len()),
        Value::Tuple(t) => Ok(t.len()),
        Value::Table(t) => Ok(t.borrow().len()),
        Value::Struct(s) => Ok(s.len()),
        other => Err(VmError::type_error("data structure", other)),
    }
}

/// Message text for an error value: strings verbatim, anything else
/// described.
pub fn error_message(v: &Value) -> String {
    match v {
        Value::String(_) | Value::Buffer(_) => v.to_display_string(),
        Value::Number(n) => format_number(*n),
        other => other.describe(),
    }
}
