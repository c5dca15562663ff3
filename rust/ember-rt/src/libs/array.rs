//! Mutable arrays.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

/// Resolves `[start, end)` against `len`. Negative indices count from the
/// end, with -1 meaning `len`.
pub(crate) fn slice_bounds(args: &[Value], len: usize) -> Result<(usize, usize), VmError> {
    let bound = |i: usize, default: usize| -> Result<usize, VmError> {
        match args.get(i) {
            None | Some(Value::Nil) => Ok(default),
            Some(_) => {
                let n = args::integer(args, i)?;
                let resolved = if n < 0 { len as i64 + n + 1 } else { n };
                if resolved < 0 || resolved > len as i64 {
                    return Err(args::runtime(format!("index {} out of range [0, {}]", n, len)));
                }
                Ok(resolved as usize)
            }
        }
    };
    let start = bound(1, 0)?;
    let end = bound(2, len)?;
    Ok((start, end.max(start)))
}

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("array/new", args, 1)?;
    Ok(Value::array(Vec::with_capacity(args::length(args, 0)?)))
}

fn cfun_push(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("array/push", args, 1, None)?;
    let arr = args::array(args, 0)?;
    arr.borrow_mut().extend_from_slice(&args[1..]);
    Ok(args[0].clone())
}

fn cfun_pop(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("array/pop", args, 1)?;
    let arr = args::array(args, 0)?;
    let popped = arr.borrow_mut().pop();
    Ok(popped.unwrap_or_default())
}

fn cfun_peek(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("array/peek", args, 1)?;
    let arr = args::array(args, 0)?;
    let last = arr.borrow().last().cloned();
    Ok(last.unwrap_or_default())
}

fn cfun_concat(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("array/concat", args, 1, None)?;
    let arr = args::array(args, 0)?;
    for part in &args[1..] {
        let items = part.as_indexed().unwrap_or_else(|| vec![part.clone()]);
        arr.borrow_mut().extend(items);
    }
    Ok(args[0].clone())
}

fn cfun_slice(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("array/slice", args, 1, Some(3))?;
    let items = args::indexed(args, 0)?;
    let (start, end) = slice_bounds(args, items.len())?;
    Ok(Value::array(items[start..end].to_vec()))
}

const ENTRIES: &[Entry] = &[
    ("array/new", cfun_new,
        "(array/new capacity)\n\nCreates a new empty array with a pre-allocated capacity."),
    ("array/push", cfun_push,
        "(array/push arr & xs)\n\nPush all the elements of xs to the end of an array. Modifies the input array and returns it."),
    ("array/pop", cfun_pop,
        "(array/pop arr)\n\nRemove the last element of the array and return it. If the array is empty, will return nil. Modifies the input array."),
    ("array/peek", cfun_peek,
        "(array/peek arr)\n\nReturns the last element of the array. Does not modify the array."),
    ("array/concat", cfun_concat,
        "(array/concat arr & parts)\n\nConcatenates a variadic number of arrays (and tuples) into the first argument, which must be an array. If any of the parts are arrays or tuples, their elements will be inserted into the array. Otherwise, each part in parts will be appended to arr in order. Return the modified array arr."),
    ("array/slice", cfun_slice,
        "(array/slice arrtup &opt start end)\n\nTakes a slice of array or tuple from start to end. The range is half open, [start, end). Indexes can also be negative, indicating indexing from the end of the array. By default, start is 0 and end is the length of the array. Returns a new array."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_peek() {
        let mut vm = Vm::default();
        let arr = Value::array(vec![]);
        cfun_push(&mut vm, &[arr.clone(), 1.into(), 2.into()]).unwrap();
        assert_eq!(cfun_peek(&mut vm, &[arr.clone()]).unwrap(), Value::Number(2.0));
        assert_eq!(cfun_pop(&mut vm, &[arr.clone()]).unwrap(), Value::Number(2.0));
        assert_eq!(cfun_pop(&mut vm, &[arr.clone()]).unwrap(), Value::Number(1.0));
        assert_eq!(cfun_pop(&mut vm, &[arr]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_concat_splices_sequences() {
        let mut vm = Vm::default();
        let arr = Value::array(vec![1.into()]);
        let tup = Value::tuple(vec![2.into(), 3.into()]);
        cfun_concat(&mut vm, &[arr.clone(), tup, 4.into()]).unwrap();
        assert_eq!(arr.describe(), "@[1 2 3 4]");
    }

    #[test]
    fn test_slice_with_negative_indices() {
        let mut vm = Vm::default();
        let arr = Value::array(vec![1.into(), 2.into(), 3.into(), 4.into()]);
        let s = cfun_slice(&mut vm, &[arr.clone(), 1.into(), (-2).into()]).unwrap();
        assert_eq!(s.describe(), "@[2 3]");
        assert!(cfun_slice(&mut vm, &[arr, 9.into()]).is_err());
    }

    #[test]
    fn test_new_caps_capacity() {
        let mut vm = Vm::default();
        let err = cfun_new(&mut vm, &[Value::Number(4e9)]).unwrap_err();
        assert!(matches!(err, VmError::Runtime(_)));
        assert!(cfun_new(&mut vm, &[16.into()]).is_ok());
    }
}
