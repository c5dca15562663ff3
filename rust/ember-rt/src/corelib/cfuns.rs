//! Native primitives of the core environment.

use super::native;
use crate::args;
use crate::env::Env;
use crate::scan::scan_number;
use crate::symbols;
use crate::table::{hash_value, Struct, Table};
use crate::value::{NativeFn, Value};
use crate::vm::{Vm, VmError};
use std::path::Path;

fn io_error(e: std::io::Error) -> VmError {
    VmError::Runtime(format!("io error: {}", e))
}

fn concat(args: &[Value]) -> Vec<u8> {
    args.iter().flat_map(|v| v.to_bytes()).collect()
}

fn cfun_native(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("native", args, 1, Some(2))?;
    let path = args::string(args, 0)?;
    let env = args::opt_env(args, 1)?;
    let env = native::load(Path::new(&path), env)?;
    Ok(env.to_value())
}

fn cfun_print(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    let mut line = concat(args);
    line.push(b'\n');
    let out = vm.output();
    out.write_all(&line).map_err(io_error)?;
    out.flush().map_err(io_error)?;
    Ok(Value::Nil)
}

fn cfun_describe(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("describe", args, 1)?;
    Ok(Value::string(args[0].describe()))
}

fn cfun_string(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::string(concat(args)))
}

fn cfun_symbol(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::symbol(concat(args)))
}

fn cfun_keyword(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::keyword(concat(args)))
}

fn cfun_buffer(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::buffer(concat(args)))
}

fn cfun_abstract_p(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("abstract?", args, 1)?;
    Ok(Value::Boolean(matches!(args[0], Value::Abstract(_))))
}

fn cfun_table(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::table(Table::from_pairs(args::pairs(args)?)))
}

fn cfun_array(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::array(args.to_vec()))
}

fn cfun_tuple(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::tuple(args.to_vec()))
}

fn cfun_struct(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    Ok(Value::structure(Struct::from_pairs(args::pairs(args)?)))
}

fn cfun_scan_number(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("scan-number", args, 1)?;
    let src = args::bytes(args, 0)?;
    Ok(scan_number(&src).map(Value::Number).unwrap_or(Value::Nil))
}

fn cfun_gensym(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("gensym", args, 0)?;
    Ok(Value::Symbol(symbols::gensym()))
}

fn cfun_gccollect(vm: &mut Vm, _args: &[Value]) -> Result<Value, VmError> {
    vm.gc_collect();
    Ok(Value::Nil)
}

fn cfun_gcsetinterval(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("gcsetinterval", args, 1)?;
    let interval = args::integer(args, 0)?;
    if interval < 0 {
        return Err(args::runtime("expected non-negative integer"));
    }
    vm.set_gc_interval(interval as usize);
    Ok(Value::Nil)
}

fn cfun_gcinterval(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("gcinterval", args, 0)?;
    Ok(Value::Number(vm.gc_interval() as f64))
}

fn cfun_type(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("type", args, 1)?;
    Ok(Value::keyword(args[0].type_name()))
}

fn next_index(len: usize, key: &Value) -> Result<Value, VmError> {
    let next = match key {
        Value::Nil => 0,
        other => match other.as_index() {
            Some(i) => i + 1,
            None => return Ok(Value::Nil),
        },
    };
    Ok(if next < len {
        Value::Number(next as f64)
    } else {
        Value::Nil
    })
}

fn cfun_next(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("next", args, 1, Some(2))?;
    let key = args.get(1).cloned().unwrap_or(Value::Nil);
    match &args[0] {
        Value::Table(t) => Ok(t.borrow().next_key(&key)),
        Value::Struct(s) => Ok(s.next_key(&key)),
        Value::Array(a) => next_index(a.borrow().len(), &key),
        Value::Tuple(t) => next_index(t.len(), &key),
        Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => next_index(s.len(), &key),
        Value::Buffer(b) => next_index(b.borrow().len(), &key),
        other => Err(VmError::type_error("data structure", other)),
    }
}

fn cfun_hash(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("hash", args, 1)?;
    Ok(Value::Number(hash_value(&args[0]) as i32 as f64))
}

fn cfun_getline(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("getline", args, 0, Some(2))?;
    let prompt = match args.first() {
        None | Some(Value::Nil) => Vec::new(),
        Some(_) => args::bytes(args, 0)?,
    };
    let buf = match args.get(1) {
        None | Some(Value::Nil) => Value::buffer(Vec::new()),
        Some(_) => Value::Buffer(args::buffer(args, 1)?),
    };
    {
        let out = vm.output();
        out.write_all(&prompt).map_err(io_error)?;
        out.flush().map_err(io_error)?;
    }
    let mut line = Vec::new();
    vm.input().read_until(b'\n', &mut line).map_err(io_error)?;
    if let Value::Buffer(b) = &buf {
        b.borrow_mut().extend_from_slice(&line);
    }
    Ok(buf)
}

/// Name, routine, and documentation of every native primitive.
pub const CATALOG: &[(&str, NativeFn, &str)] = &[
    ("native", cfun_native,
        "(native path &opt env)\n\nLoad a native module from the given path. The path must be an absolute or relative path on the file system, and is usually a .so file on Unix systems and a .dll file on Windows. Returns an environment table that contains functions and other values from the native module."),
    ("print", cfun_print,
        "(print & xs)\n\nPrint values to the console (standard out). Value are converted to strings if they are not already. After printing all values, a newline character is printed. Returns nil."),
    ("describe", cfun_describe,
        "(describe x)\n\nReturns a string that is a human readable description of a value x."),
    ("string", cfun_string,
        "(string & parts)\n\nCreates a string by concatenating values together. Values are converted to bytes if they are not already. Returns the new string."),
    ("symbol", cfun_symbol,
        "(symbol & xs)\n\nCreates a symbol by concatenating values together. Values are converted to bytes if they are not already. Returns the new symbol."),
    ("keyword", cfun_keyword,
        "(keyword & xs)\n\nCreates a keyword by concatenating values together. Values are converted to bytes if they are not already. Returns the new keyword."),
    ("buffer", cfun_buffer,
        "(buffer & xs)\n\nCreates a new buffer by concatenating values together. Values are converted to bytes if they are not already. Returns the new buffer."),
    ("abstract?", cfun_abstract_p,
        "(abstract? x)\n\nCheck if x is an abstract type."),
    ("table", cfun_table,
        "(table & kvs)\n\nCreates a new table from a variadic number of keys and values. kvs is a sequence k1, v1, k2, v2, k3, v3, ... If kvs has an odd number of elements, an error will be thrown. Returns the new table."),
    ("array", cfun_array,
        "(array & items)\n\nCreate a new array that contains items. Returns the new array."),
    ("scan-number", cfun_scan_number,
        "(scan-number str)\n\nParse a number from a byte sequence and return that number, either an integer or a real. The number must be in the same format as numbers in source code. Will return nil on an invalid number."),
    ("tuple", cfun_tuple,
        "(tuple & items)\n\nCreates a new tuple that contains items. Returns the new tuple."),
    ("struct", cfun_struct,
        "(struct & kvs)\n\nCreate a new struct from a sequence of key value pairs. kvs is a sequence k1, v1, k2, v2, k3, v3, ... If kvs has an odd number of elements, an error will be thrown. Returns the new struct."),
    ("gensym", cfun_gensym,
        "(gensym)\n\nReturns a new symbol that is unique across the runtime. This means it will not collide with any already created symbols during compilation, so it can be used in macros to generate automatic bindings."),
    ("gccollect", cfun_gccollect,
        "(gccollect)\n\nRun garbage collection. You should probably not call this manually."),
    ("gcsetinterval", cfun_gcsetinterval,
        "(gcsetinterval interval)\n\nSet an integer number of bytes to allocate before running garbage collection. Low values for interval will be slower but use less memory. High values will be faster but use more memory."),
    ("gcinterval", cfun_gcinterval,
        "(gcinterval)\n\nReturns the integer number of bytes to allocate before running an iteration of garbage collection."),
    ("type", cfun_type,
        "(type x)\n\nReturns the type of x as a keyword. x is one of :nil, :boolean, :number, :array, :tuple, :table, :struct, :string, :buffer, :symbol, :keyword, :function, :cfunction, :fiber, or the name of an abstract type."),
    ("next", cfun_next,
        "(next ds &opt key)\n\nGets the next key in a data structure. Can be used to iterate through the keys of a data structure in an unspecified order. Keys are guaranteed to be seen only once per iteration if the data structure is not mutated during iteration. If key is nil, next returns the first key. If next returns nil, there are no more keys to iterate through."),
    ("hash", cfun_hash,
        "(hash value)\n\nGets a hash for any value. The hash is an integer can be used as a cheap hash function for all values. If two values are strictly equal, then they will have the same hash value."),
    ("getline", cfun_getline,
        "(getline &opt prompt buf)\n\nReads a line of input into a buffer, including the newline character, using a prompt. Returns the modified buffer. Use this function to implement a simple interface for a terminal program."),
];

/// Binds every entry of [`CATALOG`] in `env`.
pub fn register(env: &Env) {
    for &(name, fun, doc) in CATALOG {
        env.def(name, Value::cfunction(name, fun), Some(doc));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, VmError> {
        let (_, fun, _) = CATALOG.iter().find(|(n, _, _)| *n == name).unwrap();
        fun(&mut Vm::default(), args)
    }

    #[test]
    fn test_dictionary_constructors_reject_odd_counts() {
        let three = [1.into(), 2.into(), 3.into()];
        for name in ["table", "struct"] {
            let err = call(name, &three).unwrap_err();
            assert_eq!(err.to_string(), "runtime error: expected even number of arguments");
        }
        assert!(call("table", &[]).is_ok());
    }

    #[test]
    fn test_sequence_constructors_accept_any_count() {
        for name in ["array", "tuple", "buffer"] {
            assert!(call(name, &[]).is_ok());
            assert!(call(name, &[1.into(), 2.into(), 3.into()]).is_ok());
        }
        assert_eq!(
            call("buffer", &["ab".into(), 1.into()]).unwrap().to_bytes(),
            b"ab1"
        );
    }

    #[test]
    fn test_next_over_table() {
        let t = call("table", &[Value::keyword("a"), 1.into(), Value::keyword("b"), 2.into()]).unwrap();
        let first = call("next", &[t.clone(), Value::Nil]).unwrap();
        let second = call("next", &[t.clone(), first.clone()]).unwrap();
        assert_ne!(first, second);
        assert_eq!(call("next", &[t.clone(), second]).unwrap(), Value::Nil);
        assert_eq!(call("next", &[t, Value::keyword("zz")]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_next_over_tuple_indices() {
        let t = Value::tuple(vec![Value::Nil, Value::Nil]);
        assert_eq!(call("next", &[t.clone()]).unwrap(), Value::Number(0.0));
        assert_eq!(call("next", &[t.clone(), 0.into()]).unwrap(), Value::Number(1.0));
        assert_eq!(call("next", &[t, 1.into()]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_gensym_is_fresh() {
        let taken = Value::symbol("_000001");
        let fresh = call("gensym", &[]).unwrap();
        assert_ne!(fresh, taken);
        assert!(matches!(fresh, Value::Symbol(_)));
    }

    #[test]
    fn test_gcsetinterval_rejects_negative() {
        assert!(call("gcsetinterval", &[(-1).into()]).is_err());
        let mut vm = Vm::default();
        cfun_gcsetinterval(&mut vm, &[4096.into()]).unwrap();
        assert_eq!(cfun_gcinterval(&mut vm, &[]).unwrap(), Value::Number(4096.0));
    }

    #[test]
    fn test_type_keywords() {
        assert_eq!(call("type", &[Value::Nil]).unwrap(), Value::keyword("nil"));
        assert_eq!(
            call("type", &[Value::cfunction("print", cfun_print)]).unwrap(),
            Value::keyword("cfunction")
        );
    }

    #[test]
    fn test_getline_reads_from_vm_input() {
        let input = std::io::Cursor::new(b"hello\nworld\n".to_vec());
        let mut vm = Vm::default()
            .with_input(Box::new(input))
            .with_output(Box::new(std::io::sink()));
        let line = cfun_getline(&mut vm, &["> ".into()]).unwrap();
        assert_eq!(line.to_bytes(), b"hello\n");
    }

    #[test]
    fn test_scan_number_returns_nil_on_garbage() {
        assert_eq!(call("scan-number", &["0x10".into()]).unwrap(), Value::Number(16.0));
        assert_eq!(call("scan-number", &["ten".into()]).unwrap(), Value::Nil);
    }
}
