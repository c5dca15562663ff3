//! Reading source text into data.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::reader::{self, Form};
use crate::value::Value;
use crate::vm::{Vm, VmError};

pub(crate) fn parse_error(e: reader::ParseError) -> VmError {
    VmError::Error(Value::string(e.to_string()))
}

fn cfun_parse(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("parse", args, 1)?;
    let src = args::string(args, 0)?;
    let form = reader::parse(&src).map_err(parse_error)?;
    Ok(form.as_ref().map(Form::to_value).unwrap_or_default())
}

fn cfun_parse_all(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("parse-all", args, 1)?;
    let src = args::string(args, 0)?;
    let forms = reader::parse_all(&src).map_err(parse_error)?;
    Ok(Value::array(forms.iter().map(Form::to_value).collect()))
}

const ENTRIES: &[Entry] = &[
    ("parse", cfun_parse,
        "(parse str)\n\nParse the first form of a string and return it as data. Returns nil when the string contains no forms."),
    ("parse-all", cfun_parse_all,
        "(parse-all str)\n\nParse every form in a string. Returns an array of the parsed values."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms_as_data() {
        let mut vm = Vm::default();
        let v = cfun_parse(&mut vm, &["[1 :a] (ignored)".into()]).unwrap();
        assert_eq!(v, Value::tuple(vec![1.into(), Value::keyword("a")]));
        assert_eq!(cfun_parse(&mut vm, &["  # only a comment".into()]).unwrap(), Value::Nil);
        let all = cfun_parse_all(&mut vm, &["a b c".into()]).unwrap();
        assert_eq!(all.describe(), "@[a b c]");
    }

    #[test]
    fn test_parse_error_is_catchable() {
        let err = cfun_parse(&mut Vm::default(), &["(unclosed".into()]).unwrap_err();
        assert!(matches!(err, VmError::Error(_)));
    }
}
