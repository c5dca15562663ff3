//! Mutable byte buffers.

use super::array::slice_bounds;
use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("buffer/new", args, 1)?;
    Ok(Value::buffer(Vec::with_capacity(args::length(args, 0)?)))
}

fn cfun_push_string(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("buffer/push-string", args, 1, None)?;
    let buf = args::buffer(args, 0)?;
    for i in 1..args.len() {
        let bytes = args::bytes(args, i)?;
        buf.borrow_mut().extend_from_slice(&bytes);
    }
    Ok(args[0].clone())
}

fn cfun_push_byte(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("buffer/push-byte", args, 1, None)?;
    let buf = args::buffer(args, 0)?;
    for i in 1..args.len() {
        let byte = args::integer(args, i)?;
        buf.borrow_mut().push(byte as u8);
    }
    Ok(args[0].clone())
}

fn cfun_clear(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("buffer/clear", args, 1)?;
    args::buffer(args, 0)?.borrow_mut().clear();
    Ok(args[0].clone())
}

fn cfun_slice(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("buffer/slice", args, 1, Some(3))?;
    let bytes = args::bytes(args, 0)?;
    let (start, end) = slice_bounds(args, bytes.len())?;
    Ok(Value::buffer(bytes[start..end].to_vec()))
}

const ENTRIES: &[Entry] = &[
    ("buffer/new", cfun_new,
        "(buffer/new capacity)\n\nCreates a new, empty buffer with enough memory for capacity bytes. Returns a new buffer."),
    ("buffer/push-string", cfun_push_string,
        "(buffer/push-string buffer & strs)\n\nPush byte sequences onto the end of a buffer. Returns the modified buffer."),
    ("buffer/push-byte", cfun_push_byte,
        "(buffer/push-byte buffer & xs)\n\nAppend bytes to a buffer. Integers are truncated to their low 8 bits. Returns the modified buffer."),
    ("buffer/clear", cfun_clear,
        "(buffer/clear buffer)\n\nSets the size of a buffer to 0 and empties it. The buffer retains its memory so it can be efficiently refilled. Returns the modified buffer."),
    ("buffer/slice", cfun_slice,
        "(buffer/slice bytes &opt start end)\n\nTakes a slice of a byte sequence from start to end. The range is half open, [start, end). Indexes can also be negative, indicating indexing from the end of the sequence. Returns a new buffer."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut vm = Vm::default();
        let buf = cfun_new(&mut vm, &[8.into()]).unwrap();
        cfun_push_string(&mut vm, &[buf.clone(), "ab".into(), Value::keyword("c")]).unwrap();
        cfun_push_byte(&mut vm, &[buf.clone(), 0x44.into(), 0x145.into()]).unwrap();
        assert_eq!(buf.to_bytes(), b"abcDE");
        let tail = cfun_slice(&mut vm, &[buf.clone(), 3.into()]).unwrap();
        assert_eq!(tail.to_bytes(), b"DE");
        cfun_clear(&mut vm, &[buf.clone()]).unwrap();
        assert!(buf.to_bytes().is_empty());
    }

    #[test]
    fn test_new_caps_capacity() {
        let err = cfun_new(&mut Vm::default(), &[Value::Number(4e9)]).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }
}
