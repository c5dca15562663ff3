//! Evaluating data and source text.

use super::parse::parse_error;
use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::eval::Evaluator;
use crate::reader::Form;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn target_env(vm: &Vm, args: &[Value], i: usize) -> Result<Env, VmError> {
    match args::opt_env(args, i)? {
        Some(env) => Ok(env),
        None => vm
            .root_env()
            .ok_or_else(|| args::runtime("no environment to evaluate in")),
    }
}

fn cfun_eval(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("eval", args, 1, Some(2))?;
    let env = target_env(vm, args, 1)?;
    let form = Form::from_value(&args[0]).map_err(parse_error)?;
    Evaluator::new(vm, env, "eval").eval(&form)
}

fn cfun_eval_string(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("eval-string", args, 1, Some(2))?;
    let src = args::string(args, 0)?;
    let env = target_env(vm, args, 1)?;
    let forms = crate::reader::parse_all(&src).map_err(parse_error)?;
    let mut evaluator = Evaluator::new(vm, env, "eval-string");
    let mut last = Value::Nil;
    for form in &forms {
        last = evaluator.eval(form)?;
    }
    Ok(last)
}

const ENTRIES: &[Entry] = &[
    ("eval", cfun_eval,
        "(eval form &opt env)\n\nEvaluates a form in the given environment, or the root environment when env is nil. Returns the value of the form."),
    ("eval-string", cfun_eval_string,
        "(eval-string str &opt env)\n\nEvaluates every form in a string and returns the value of the last one."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
