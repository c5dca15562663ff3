//! Byte-string operations.
//!
//! Strings are byte sequences; case mapping is ASCII only.

use super::array::slice_bounds;
use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn cfun_slice(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("string/slice", args, 1, Some(3))?;
    let bytes = args::bytes(args, 0)?;
    let (start, end) = slice_bounds(args, bytes.len())?;
    Ok(Value::string(&bytes[start..end]))
}

fn cfun_upper(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("string/ascii-upper", args, 1)?;
    Ok(Value::string(args::bytes(args, 0)?.to_ascii_uppercase()))
}

fn cfun_lower(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("string/ascii-lower", args, 1)?;
    Ok(Value::string(args::bytes(args, 0)?.to_ascii_lowercase()))
}

fn cfun_find(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("string/find", args, 2, Some(3))?;
    let needle = args::bytes(args, 0)?;
    let haystack = args::bytes(args, 1)?;
    let from = match args.get(2) {
        None | Some(Value::Nil) => 0,
        Some(_) => args::index(args, 2)?,
    };
    Ok(find_from(&haystack, &needle, from)
        .map(|i| Value::Number(i as f64))
        .unwrap_or_default())
}

fn cfun_join(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("string/join", args, 1, Some(2))?;
    let parts = args::indexed(args, 0)?;
    let sep = match args.get(1) {
        None | Some(Value::Nil) => Vec::new(),
        Some(_) => args::bytes(args, 1)?,
    };
    let mut out = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(&sep);
        }
        match part.as_bytes() {
            Some(b) => out.extend_from_slice(b),
            None => match part {
                Value::Buffer(b) => out.extend_from_slice(&b.borrow()),
                other => return Err(VmError::type_error("string", other)),
            },
        }
    }
    Ok(Value::string(out))
}

fn cfun_split(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("string/split", args, 2)?;
    let delim = args::bytes(args, 0)?;
    let src = args::bytes(args, 1)?;
    if delim.is_empty() {
        return Err(args::runtime("expected non-empty delimiter"));
    }
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(i) = find_from(&src, &delim, start) {
        parts.push(Value::string(&src[start..i]));
        start = i + delim.len();
    }
    parts.push(Value::string(&src[start..]));
    Ok(Value::array(parts))
}

fn cfun_has_prefix(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("string/has-prefix?", args, 2)?;
    Ok(Value::Boolean(args::bytes(args, 1)?.starts_with(&args::bytes(args, 0)?)))
}

fn cfun_has_suffix(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("string/has-suffix?", args, 2)?;
    Ok(Value::Boolean(args::bytes(args, 1)?.ends_with(&args::bytes(args, 0)?)))
}

const ENTRIES: &[Entry] = &[
    ("string/slice", cfun_slice,
        "(string/slice bytes &opt start end)\n\nReturns a substring from a byte sequence. The substring is from index start inclusive to index end exclusive. All indexing is from 0. start and end can also be negative to indicate indexing from the end of the string."),
    ("string/ascii-upper", cfun_upper,
        "(string/ascii-upper str)\n\nReturns a new string where all bytes are replaced with the uppercase version of themselves in ASCII."),
    ("string/ascii-lower", cfun_lower,
        "(string/ascii-lower str)\n\nReturns a new string where all bytes are replaced with the lowercase version of themselves in ASCII."),
    ("string/find", cfun_find,
        "(string/find patt str &opt start-index)\n\nSearches for the first instance of pattern patt in string str. Returns the index of the first character in patt if found, otherwise returns nil."),
    ("string/join", cfun_join,
        "(string/join parts &opt sep)\n\nJoins an array of strings into one string, optionally separated by a separator string sep."),
    ("string/split", cfun_split,
        "(string/split delim str)\n\nSplits a string str with delimiter delim and returns an array of substrings. The substrings will not contain the delimiter delim."),
    ("string/has-prefix?", cfun_has_prefix,
        "(string/has-prefix? pfx str)\n\nTests whether str starts with pfx."),
    ("string/has-suffix?", cfun_has_suffix,
        "(string/has-suffix? sfx str)\n\nTests whether str ends with sfx."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_split() {
        let mut vm = Vm::default();
        assert_eq!(cfun_find(&mut vm, &["lo".into(), "hello lo".into()]).unwrap(), Value::Number(3.0));
        assert_eq!(cfun_find(&mut vm, &["lo".into(), "hello lo".into(), 4.into()]).unwrap(), Value::Number(6.0));
        assert_eq!(cfun_find(&mut vm, &["zz".into(), "hello".into()]).unwrap(), Value::Nil);
        let parts = cfun_split(&mut vm, &[",".into(), "a,,b".into()]).unwrap();
        assert_eq!(parts.describe(), "@[\"a\" \"\" \"b\"]");
    }

    #[test]
    fn test_join_and_case() {
        let mut vm = Vm::default();
        let parts = Value::tuple(vec!["a".into(), Value::keyword("b")]);
        assert_eq!(cfun_join(&mut vm, &[parts, "-".into()]).unwrap(), Value::string("a-b"));
        assert_eq!(cfun_upper(&mut vm, &["abc1".into()]).unwrap(), Value::string("ABC1"));
        assert_eq!(cfun_has_suffix(&mut vm, &[".ember".into(), "core.ember".into()]).unwrap(), Value::Boolean(true));
    }
}
