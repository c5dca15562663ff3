//! Fiber construction and inspection.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::fiber::Fiber;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use std::cell::RefCell;
use std::rc::Rc;

fn fiber_arg(args: &[Value], i: usize) -> Result<Rc<RefCell<Fiber>>, VmError> {
    match &args[i] {
        Value::Fiber(f) => Ok(f.clone()),
        other => Err(VmError::type_error("fiber", other)),
    }
}

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("fiber/new", args, 1)?;
    match &args[0] {
        Value::Function(f) => Ok(Value::Fiber(Rc::new(RefCell::new(Fiber::new(f.clone()))))),
        other => Err(VmError::type_error("function", other)),
    }
}

fn cfun_status(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("fiber/status", args, 1)?;
    let status = fiber_arg(args, 0)?.borrow().status();
    Ok(Value::keyword(status.name()))
}

fn cfun_last_value(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("fiber/last-value", args, 1)?;
    let last = fiber_arg(args, 0)?.borrow().last_value().clone();
    Ok(last)
}

const ENTRIES: &[Entry] = &[
    ("fiber/new", cfun_new,
        "(fiber/new func)\n\nCreate a new fiber with function body func. The fiber starts in the :new state; the first resume calls func with the resume value. Returns the new fiber."),
    ("fiber/status", cfun_status,
        "(fiber/status fib)\n\nGet the status of a fiber. The status will be one of:\n\n* :dead - the fiber has finished\n* :error - the fiber has errored out\n* :pending - the fiber has been yielded\n* :alive - the fiber is currently running and cannot be resumed\n* :new - the fiber has just been created and not yet run"),
    ("fiber/last-value", cfun_last_value,
        "(fiber/last-value fib)\n\nGet the last value returned or signaled from the fiber."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
