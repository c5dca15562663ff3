//! Auxiliary libraries bound into the core environment after the
//! primitives. Each module exposes `populate(vm, env)`.

pub mod array;
#[cfg(feature = "assembler")]
pub mod asm;
#[cfg(feature = "bigint")]
pub mod bigint;
pub mod buffer;
pub mod compile;
pub mod debug;
pub mod fiber;
pub mod io;
pub mod marsh;
pub mod math;
pub mod os;
pub mod parse;
#[cfg(feature = "pattern")]
pub mod pattern;
pub mod string;
pub mod table;
pub mod tuple;
#[cfg(feature = "typed-array")]
pub mod typed_array;

use crate::env::Env;
use crate::value::{NativeFn, Value};
use crate::vm::Vm;

/// One library entry: name, routine, documentation.
pub type Entry = (&'static str, NativeFn, &'static str);

pub(crate) fn bind(env: &Env, entries: &[Entry]) {
    for &(name, fun, doc) in entries {
        env.def(name, Value::cfunction(name, fun), Some(doc));
    }
}

/// Populates every library in load order.
pub fn populate_all(vm: &mut Vm, env: &Env) {
    io::populate(vm, env);
    math::populate(vm, env);
    array::populate(vm, env);
    tuple::populate(vm, env);
    buffer::populate(vm, env);
    table::populate(vm, env);
    fiber::populate(vm, env);
    os::populate(vm, env);
    parse::populate(vm, env);
    compile::populate(vm, env);
    debug::populate(vm, env);
    string::populate(vm, env);
    marsh::populate(vm, env);
    #[cfg(feature = "pattern")]
    pattern::populate(vm, env);
    #[cfg(feature = "assembler")]
    asm::populate(vm, env);
    #[cfg(feature = "typed-array")]
    typed_array::populate(vm, env);
    #[cfg(feature = "bigint")]
    bigint::populate(vm, env);
}
