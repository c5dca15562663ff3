//! Regular expressions over byte strings.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use regex::bytes::Regex;

fn compile(args: &[Value]) -> Result<Regex, VmError> {
    let src = args::string(args, 0)?;
    Regex::new(&src).map_err(|e| VmError::Error(Value::string(e.to_string())))
}

fn cfun_match_p(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("pattern/match?", args, 2)?;
    let re = compile(args)?;
    Ok(Value::Boolean(re.is_match(&args::bytes(args, 1)?)))
}

fn cfun_find(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("pattern/find", args, 2)?;
    let re = compile(args)?;
    let text = args::bytes(args, 1)?;
    Ok(re
        .find(&text)
        .map(|m| Value::Number(m.start() as f64))
        .unwrap_or_default())
}

fn cfun_find_all(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("pattern/find-all", args, 2)?;
    let re = compile(args)?;
    let text = args::bytes(args, 1)?;
    Ok(Value::array(
        re.find_iter(&text)
            .map(|m| Value::string(m.as_bytes()))
            .collect(),
    ))
}

fn cfun_replace(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("pattern/replace", args, 3)?;
    let re = compile(args)?;
    let replacement = args::bytes(args, 1)?;
    let text = args::bytes(args, 2)?;
    Ok(Value::string(re.replace_all(&text, replacement.as_slice())))
}

const ENTRIES: &[Entry] = &[
    ("pattern/match?", cfun_match_p,
        "(pattern/match? patt str)\n\nTests whether the regular expression patt matches anywhere in str."),
    ("pattern/find", cfun_find,
        "(pattern/find patt str)\n\nReturns the index of the first match of patt in str, or nil."),
    ("pattern/find-all", cfun_find_all,
        "(pattern/find-all patt str)\n\nReturns an array of every non-overlapping match of patt in str."),
    ("pattern/replace", cfun_replace,
        "(pattern/replace patt rep str)\n\nReplaces every match of patt in str with rep. $1 style group references are expanded. Returns a new string."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_find_replace() {
        let mut vm = Vm::default();
        let digits: Value = "[0-9]+".into();
        assert_eq!(cfun_match_p(&mut vm, &[digits.clone(), "ab12".into()]).unwrap(), Value::Boolean(true));
        assert_eq!(cfun_find(&mut vm, &[digits.clone(), "ab12".into()]).unwrap(), Value::Number(2.0));
        let all = cfun_find_all(&mut vm, &[digits.clone(), "1 22 333".into()]).unwrap();
        assert_eq!(all.describe(), "@[\"1\" \"22\" \"333\"]");
        let out = cfun_replace(&mut vm, &["(\\w+)@".into(), "<$1>".into(), "me@ you@".into()]).unwrap();
        assert_eq!(out, Value::string("<me> <you>"));
    }

    #[test]
    fn test_bad_pattern_is_catchable() {
        let err = cfun_match_p(&mut Vm::default(), &["(".into(), "x".into()]).unwrap_err();
        assert!(matches!(err, VmError::Error(_)));
    }
}
