//! Tables and their prototypes.

use super::{bind, Entry};
use crate::args;
use crate::env::Env;
use crate::table::{Struct, Table};
use crate::value::Value;
use crate::vm::{Vm, VmError};

fn cfun_new(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("table/new", args, 1)?;
    Ok(Value::table(Table::with_capacity(args::length(args, 0)?)))
}

fn cfun_getproto(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("table/getproto", args, 1)?;
    let t = args::table(args, 0)?;
    let proto = t.borrow().proto().cloned();
    Ok(proto.map(Value::Table).unwrap_or_default())
}

fn cfun_setproto(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("table/setproto", args, 2)?;
    let t = args::table(args, 0)?;
    let proto = match &args[1] {
        Value::Nil => None,
        _ => Some(args::table(args, 1)?),
    };
    t.borrow_mut().set_proto(proto);
    Ok(args[0].clone())
}

fn cfun_rawget(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("table/rawget", args, 2)?;
    let t = args::table(args, 0)?;
    let v = t.borrow().raw_get(&args[1]).cloned();
    Ok(v.unwrap_or_default())
}

fn cfun_to_struct(_vm: &mut Vm, args: &[Value]) -> Result<Value, VmError> {
    args::fix_arity("table/to-struct", args, 1)?;
    let t = args::table(args, 0)?;
    let pairs: Vec<(Value, Value)> = t
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(Value::structure(Struct::from_pairs(pairs)))
}

const ENTRIES: &[Entry] = &[
    ("table/new", cfun_new,
        "(table/new capacity)\n\nCreates a new empty table with pre-allocated memory for capacity entries. Returns the new table."),
    ("table/getproto", cfun_getproto,
        "(table/getproto tab)\n\nGet the prototype table of a table. Returns nil if a table has no prototype, otherwise returns the prototype."),
    ("table/setproto", cfun_setproto,
        "(table/setproto tab proto)\n\nSet the prototype of a table. Returns the original table tab."),
    ("table/rawget", cfun_rawget,
        "(table/rawget tab key)\n\nGets a value from a table without looking at the prototype table. If a table tab does not contain the key directly, the function will return nil without checking the prototype. Returns the value in the table."),
    ("table/to-struct", cfun_to_struct,
        "(table/to-struct tab)\n\nConvert a table to a struct. Returns a new struct. This function does not take into account prototype tables."),
];

pub fn populate(_vm: &mut Vm, env: &Env) {
    bind(env, ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_lookup_and_rawget() {
        let mut vm = Vm::default();
        let parent = Value::table(Table::from_pairs([(Value::keyword("x"), 1.into())]));
        let child = cfun_new(&mut vm, &[4.into()]).unwrap();
        cfun_setproto(&mut vm, &[child.clone(), parent.clone()]).unwrap();
        assert_eq!(cfun_getproto(&mut vm, &[child.clone()]).unwrap(), parent);
        assert_eq!(crate::vm::ops::get(&child, &Value::keyword("x")).unwrap(), Value::Number(1.0));
        assert_eq!(cfun_rawget(&mut vm, &[child.clone(), Value::keyword("x")]).unwrap(), Value::Nil);
        cfun_setproto(&mut vm, &[child.clone(), Value::Nil]).unwrap();
        assert_eq!(cfun_getproto(&mut vm, &[child]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_to_struct() {
        let t = Value::table(Table::from_pairs([(Value::keyword("a"), 1.into())]));
        let s = cfun_to_struct(&mut Vm::default(), &[t]).unwrap();
        assert_eq!(s.describe(), "{:a 1}");
    }
}
