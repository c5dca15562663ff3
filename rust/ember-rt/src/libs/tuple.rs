//! Immutable tuples.

use super::array::slice_bounds;
use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn cfun_slice(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("tuple/slice", args, 1, Some(3))?;
    let items = args::indexed(args, 0)?;
    let (start, end) = slice_bounds(args, items.len())?;
    Ok(Value::tuple(items[start..end].to_vec()))
}

const ENTRIES: &[Entry] = &[(
    "tuple/slice",
    cfun_slice,
    "(tuple/slice arrtup &opt start end)\n\nTake a sub sequence of an array or tuple from index start inclusive to index end exclusive. If start or end are not provided, they default to 0 and the length of arrtup respectively. Returns the new tuple.",
)];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
