//! File and console I/O.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use std::io::Write;

fn io_error(path: &str, e: std::io::Error) -> VmError {
    VmError::Runtime(format!("{}: {}", path, e))
}

fn cfun_slurp(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("slurp", args, 1)?;
    let path = args::string(args, 0)?;
    let bytes = std::fs::read(&path).map_err(|e| io_error(&path, e))?;
    Ok(Value::buffer(bytes))
}

fn cfun_spit(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("spit", args, 2, Some(3))?;
    let path = args::string(args, 0)?;
    let contents = args::bytes(args, 1)?;
    let append = match args.get(2) {
        None | Some(Value::Nil) => false,
        Some(Value::Keyword(mode)) if &**mode == b"a" => true,
        Some(Value::Keyword(mode)) if &**mode == b"w" => false,
        Some(other) => return Err(VmError::type_error("keyword :a or :w", other)),
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&path)
        .map_err(|e| io_error(&path, e))?;
    file.write_all(&contents).map_err(|e| io_error(&path, e))?;
    Ok(Value::Nil)
}

fn cfun_eprint(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    let mut line: Vec<u8> = args.iter().flat_map(|v| v.to_bytes()).collect();
    line.push(b'\n');
    std::io::stderr()
        .write_all(&line)
        .map_err(|e| io_error("stderr", e))?;
    Ok(Value::Nil)
}

fn cfun_flush(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("flush", args, 0)?;
    vm.output().flush().map_err(|e| io_error("stdout", e))?;
    Ok(Value::Nil)
}

const ENTRIES: &[Entry] = &[
    ("slurp", cfun_slurp,
        "(slurp path)\n\nRead all data from a file with name path and then close the file. Returns a buffer."),
    ("spit", cfun_spit,
        "(spit path contents &opt mode)\n\nWrite contents to a file at path. Can optionally append to the file with mode :a. Returns nil."),
    ("eprint", cfun_eprint,
        "(eprint & xs)\n\nLike print, but writes to standard error."),
    ("flush", cfun_flush,
        "(flush)\n\nFlush the runtime's standard output."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spit_then_slurp() {
        let path = std::env::temp_dir().join(format!("ember-io-{}.txt", std::process::id()));
        let p = Value::string(path.to_string_lossy().as_bytes());
        let mut vm = Vm::default();
        cfun_spit(&mut vm, &[p.clone(), "one".into()]).unwrap();
        cfun_spit(&mut vm, &[p.clone(), " two".into(), Value::keyword("a")]).unwrap();
        let back = cfun_slurp(&mut vm, &[p]).unwrap();
        assert_eq!(back.to_bytes(), b"one two");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_slurp_missing_file_errors() {
        let mut vm = Vm::default();
        assert!(cfun_slurp(&mut vm, &["/nonexistent/ember/file".into()]).is_err());
    }
}
