//! Image codec bindings.

use super::{bind, Entry};
use crate::args;
use crate::corelib;
use crate::env::Env;
use crate::marshal::{self, ForwardLookup, MarshalError, ReverseLookup};
use crate::table::Table;
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn marshal_error(e: MarshalError) -> VmError {
    VmError::Error(Value::string(e.to_string()))
}

fn reverse_from(args: &[Value], i: usize) -> Result<ReverseLookup, VmError> {
    match args.get(i) {
        None | Some(Value::Nil) => Ok(ReverseLookup::default()),
        Some(_) => {
            let t = args::table(args, i)?;
            let t = t.borrow();
            Ok(t.iter()
                .map(|(v, name)| (v.clone(), name.to_display_string()))
                .collect())
        }
    }
}

fn forward_from(args: &[Value], i: usize) -> Result<ForwardLookup, VmError> {
    match args.get(i) {
        None | Some(Value::Nil) => Ok(ForwardLookup::default()),
        Some(_) => {
            let t = args::table(args, i)?;
            let t = t.borrow();
            Ok(t.iter()
                .map(|(name, v)| (name.to_display_string(), v.clone()))
                .collect())
        }
    }
}

fn cfun_marshal(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("marshal", args, 1, Some(2))?;
    let lookup = reverse_from(args, 1)?;
    let bytes = marshal::marshal(&args[0], &lookup).map_err(marshal_error)?;
    Ok(Value::buffer(bytes))
}

fn cfun_unmarshal(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::arity("unmarshal", args, 1, Some(2))?;
    let bytes = args::bytes(args, 0)?;
    let lookup = forward_from(args, 1)?;
    marshal::unmarshal(&bytes, &lookup).map_err(marshal_error)
}

fn cfun_env_lookup(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("env-lookup", args, 1)?;
    let env = args::opt_env(args, 0)?.ok_or_else(|| VmError::type_error("table", &args[0]))?;
    let pairs = marshal::env_lookup(&env)
        .into_iter()
        .map(|(name, v)| (Value::symbol(name), v));
    Ok(Value::table(Table::from_pairs(pairs)))
}

fn cfun_reverse_lookup(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("reverse-lookup", args, 1)?;
    let env = args::opt_env(args, 0)?.ok_or_else(|| VmError::type_error("table", &args[0]))?;
    let pairs = marshal::reverse_lookup(&env)
        .into_iter()
        .map(|(v, name)| (v, Value::symbol(name)));
    Ok(Value::table(Table::from_pairs(pairs)))
}

fn cfun_make_image(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("make-image", args, 0)?;
    let mut scratch = Vm::default();
    let bytes = corelib::make_image(&mut scratch).map_err(|e| VmError::Error(Value::string(e.to_string())))?;
    Ok(Value::buffer(bytes))
}

fn cfun_load_image(vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("load-image", args, 1)?;
    let bytes = args::bytes(args, 0)?;
    let env = vm
        .root_env()
        .ok_or_else(|| args::runtime("no environment to resolve natives against"))?;
    marshal::unmarshal(&bytes, &marshal::env_lookup(&env)).map_err(marshal_error)
}

const ENTRIES: &[Entry] = &[
    ("marshal", cfun_marshal,
        "(marshal x &opt reverse-lookup)\n\nMarshal a value into a buffer and return the buffer. The buffer can then later be unmarshalled to reconstruct the initial value. Optionally, one can pass in a reverse lookup table to not marshal aliased values that are found in the table. Then a forward lookup table can be used to recover the original value when unmarshalling."),
    ("unmarshal", cfun_unmarshal,
        "(unmarshal buffer &opt lookup)\n\nUnmarshal a value from a buffer. An optional lookup table can be provided to allow for aliases to be resolved. Returns the value unmarshalled from the buffer."),
    ("env-lookup", cfun_env_lookup,
        "(env-lookup env)\n\nCreates a forward lookup table for unmarshalling from an environment. To create a reverse lookup table, use reverse-lookup."),
    ("reverse-lookup", cfun_reverse_lookup,
        "(reverse-lookup env)\n\nCreates a reverse lookup table for marshalling from an environment. The table maps each routine bound in env to its name."),
    ("make-image", cfun_make_image,
        "(make-image)\n\nBuilds a fresh core environment from source and returns it marshalled as an image buffer."),
    ("load-image", cfun_load_image,
        "(load-image image)\n\nUnmarshals an image, resolving native routines against the root environment. Returns the environment stored in the image."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}
