//! Runtime values for the Ember VM.
//!
//! Numbers, byte strings, symbols, keywords, tuples and structs compare by
//! value. Every mutable or callable kind compares by identity.

use crate::fiber::Fiber;
use crate::function::Function;
use crate::symbols;
use crate::table::{Struct, Table};
use crate::vm::{Vm, VmError};
use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Signature of every host routine callable from bytecode.
pub type NativeFn = fn(&mut Vm, &[Value]) -> Result<Value, VmError>;

/// A named host routine.
#[derive(Clone, Copy)]
pub struct CFunction {
    pub name: &'static str,
    pub fun: NativeFn,
}

impl fmt::Debug for CFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<cfunction {}>", self.name)
    }
}

/// Host objects exposed to the VM as opaque values.
pub trait Abstract: fmt::Debug {
    /// Name reported by `type`, without the leading colon.
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<[u8]>),
    Symbol(Rc<[u8]>),
    Keyword(Rc<[u8]>),
    Buffer(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Table(Rc<RefCell<Table>>),
    Struct(Rc<Struct>),
    Function(Rc<Function>),
    CFunction(CFunction),
    Fiber(Rc<RefCell<Fiber>>),
    Abstract(Rc<dyn Abstract>),
}

impl Value {
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Interned symbol.
    pub fn symbol(name: impl AsRef<[u8]>) -> Self {
        Value::Symbol(symbols::intern(name.as_ref()))
    }

    pub fn keyword(name: impl AsRef<[u8]>) -> Self {
        Value::Keyword(Rc::from(name.as_ref()))
    }

    pub fn buffer(bytes: Vec<u8>) -> Self {
        Value::Buffer(Rc::new(RefCell::new(bytes)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::from(items))
    }

    pub fn table(table: Table) -> Self {
        Value::Table(Rc::new(RefCell::new(table)))
    }

    pub fn structure(st: Struct) -> Self {
        Value::Struct(Rc::new(st))
    }

    pub fn cfunction(name: &'static str, fun: NativeFn) -> Self {
        Value::CFunction(CFunction { name, fun })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsey.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Buffer(_) => "buffer",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Table(_) => "table",
            Value::Struct(_) => "struct",
            Value::Function(_) => "function",
            Value::CFunction(_) => "cfunction",
            Value::Fiber(_) => "fiber",
            Value::Abstract(a) => a.type_name(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A number holding an exact 32-bit integer.
    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 => {
                Some(*n as i32)
            }
            _ => None,
        }
    }

    /// Non-negative integral number usable as an index.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Bytes of a string, symbol, or keyword.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array or tuple.
    pub fn as_indexed(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(a) => Some(a.borrow().clone()),
            Value::Tuple(t) => Some(t.to_vec()),
            _ => None,
        }
    }

    /// The `string` conversion: raw bytes for byte sequences, the
    /// description for everything else.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => s.to_vec(),
            Value::Buffer(b) => b.borrow().clone(),
            other => other.describe().into_bytes(),
        }
    }

    pub fn to_display_string(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    /// Human-readable rendering, as printed by `describe`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_into(self, &mut out, 0);
        out
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Nil => 1,
            Value::Boolean(_) => 2,
            Value::Fiber(_) => 3,
            Value::String(_) => 4,
            Value::Symbol(_) => 5,
            Value::Keyword(_) => 6,
            Value::Array(_) => 7,
            Value::Tuple(_) => 8,
            Value::Table(_) => 9,
            Value::Struct(_) => 10,
            Value::Buffer(_) => 11,
            Value::Function(_) => 12,
            Value::CFunction(_) => 13,
            Value::Abstract(_) => 14,
        }
    }

    /// Total order over all values: type rank first, then contents.
    /// Identity-compared kinds order by address.
    pub fn compare(&self, other: &Value) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => compare_numbers(*a, *b),
            (Value::String(a), Value::String(b))
            | (Value::Symbol(a), Value::Symbol(b))
            | (Value::Keyword(a), Value::Keyword(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => compare_seq(a, b),
            (Value::Struct(a), Value::Struct(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| {
                    a.iter()
                        .zip(b.iter())
                        .map(|((ka, va), (kb, vb))| ka.compare(kb).then_with(|| va.compare(vb)))
                        .find(|o| *o != Ordering::Equal)
                        .unwrap_or(Ordering::Equal)
                }),
            (Value::CFunction(a), Value::CFunction(b)) => a.name.cmp(b.name),
            _ => self.address().cmp(&other.address()),
        }
    }

    fn address(&self) -> usize {
        match self {
            Value::Buffer(b) => Rc::as_ptr(b) as *const () as usize,
            Value::Array(a) => Rc::as_ptr(a) as *const () as usize,
            Value::Table(t) => Rc::as_ptr(t) as *const () as usize,
            Value::Function(f) => Rc::as_ptr(f) as *const () as usize,
            Value::Fiber(f) => Rc::as_ptr(f) as *const () as usize,
            Value::Abstract(a) => Rc::as_ptr(a) as *const () as usize,
            _ => 0,
        }
    }
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

fn compare_seq(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let o = x.compare(y);
        if o != Ordering::Equal {
            return o;
        }
    }
    a.len().cmp(&b.len())
}

/// Integers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

const MAX_DESCRIBE_DEPTH: usize = 64;

fn describe_into(v: &Value, out: &mut String, depth: usize) {
    if depth > MAX_DESCRIBE_DEPTH {
        out.push_str("...");
        return;
    }
    match v {
        Value::Nil => out.push_str("nil"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::String(s) => escape_into(s, out),
        Value::Symbol(s) => out.push_str(&String::from_utf8_lossy(s)),
        Value::Keyword(s) => {
            out.push(':');
            out.push_str(&String::from_utf8_lossy(s));
        }
        Value::Buffer(b) => {
            out.push('@');
            escape_into(&b.borrow(), out);
        }
        Value::Array(a) => {
            out.push_str("@[");
            describe_seq(&a.borrow(), out, depth);
            out.push(']');
        }
        Value::Tuple(t) => {
            out.push('(');
            describe_seq(t, out, depth);
            out.push(')');
        }
        Value::Table(t) => {
            out.push_str("@{");
            let t = t.borrow();
            describe_pairs(t.iter(), out, depth);
            out.push('}');
        }
        Value::Struct(s) => {
            out.push('{');
            describe_pairs(s.iter(), out, depth);
            out.push('}');
        }
        Value::Function(f) => {
            out.push_str("<function ");
            out.push_str(&f.def.name);
            out.push('>');
        }
        Value::CFunction(c) => {
            out.push_str("<cfunction ");
            out.push_str(c.name);
            out.push('>');
        }
        Value::Fiber(_) => out.push_str(&format!("<fiber 0x{:x}>", v.address())),
        Value::Abstract(a) => out.push_str(&format!("<{} 0x{:x}>", a.type_name(), v.address())),
    }
}

fn describe_seq(items: &[Value], out: &mut String, depth: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        describe_into(item, out, depth + 1);
    }
}

fn describe_pairs<'a>(
    pairs: impl Iterator<Item = (&'a Value, &'a Value)>,
    out: &mut String,
    depth: usize,
) {
    for (i, (k, v)) in pairs.enumerate() {
        if i > 0 {
            out.push(' ');
        }
        describe_into(k, out, depth + 1);
        out.push(' ');
        describe_into(v, out, depth + 1);
    }
}

fn escape_into(bytes: &[u8], out: &mut String) {
    out.push('"');
    for ch in String::from_utf8_lossy(bytes).chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b))
            | (Value::Symbol(a), Value::Symbol(b))
            | (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::CFunction(a), Value::CFunction(b)) => a.name == b.name,
            (Value::Buffer(_), Value::Buffer(_))
            | (Value::Array(_), Value::Array(_))
            | (Value::Table(_), Value::Table(_))
            | (Value::Function(_), Value::Function(_))
            | (Value::Fiber(_), Value::Fiber(_))
            | (Value::Abstract(_), Value::Abstract(_)) => self.address() == other.address(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Nil => {}
            Value::Boolean(b) => b.hash(state),
            Value::Number(n) => {
                let canonical = if *n == 0.0 {
                    0.0f64
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                canonical.to_bits().hash(state)
            }
            Value::String(s) | Value::Symbol(s) | Value::Keyword(s) => s.hash(state),
            Value::Tuple(t) => t.hash(state),
            Value::Struct(s) => s.hash(state),
            Value::CFunction(c) => c.name.hash(state),
            _ => self.address().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Boolean(false).truthy());
        assert!(Value::Number(0.0).truthy());
        assert!(Value::string("").truthy());
        assert!(Value::tuple(vec![]).truthy());
    }

    #[test]
    fn test_value_equality_for_immutables() {
        assert_eq!(Value::string("abc"), Value::string("abc"));
        assert_ne!(Value::string("abc"), Value::keyword("abc"));
        assert_eq!(
            Value::tuple(vec![1.into(), "x".into()]),
            Value::tuple(vec![1.into(), "x".into()])
        );
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_identity_equality_for_mutables() {
        let a = Value::array(vec![]);
        let b = Value::array(vec![]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_agrees_with_eq() {
        let mut set = HashSet::new();
        set.insert(Value::Number(0.0));
        set.insert(Value::Number(-0.0));
        set.insert(Value::string("k"));
        set.insert(Value::string("k"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_total_order() {
        assert_eq!(Value::Number(3.0).compare(&Value::Number(2.0)), Ordering::Greater);
        assert_eq!(Value::Number(1.0).compare(&Value::Nil), Ordering::Less);
        assert_eq!(Value::string("b").compare(&Value::string("a")), Ordering::Greater);
        let short = Value::tuple(vec![1.into()]);
        let long = Value::tuple(vec![1.into(), 2.into()]);
        assert_eq!(short.compare(&long), Ordering::Less);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Value::Number(6.0).describe(), "6");
        assert_eq!(Value::Number(1.5).describe(), "1.5");
        assert_eq!(Value::string("a\"b").describe(), "\"a\\\"b\"");
        assert_eq!(Value::keyword("doc").describe(), ":doc");
        assert_eq!(
            Value::array(vec![1.into(), Value::Nil]).describe(),
            "@[1 nil]"
        );
        assert_eq!(Value::tuple(vec![true.into()]).describe(), "(true)");
    }

    #[test]
    fn test_to_bytes_is_raw_for_strings() {
        assert_eq!(Value::keyword("abc").to_bytes(), b"abc");
        assert_eq!(Value::Number(-2.0).to_bytes(), b"-2");
    }

    #[test]
    fn test_int32_conversion() {
        assert_eq!(Value::Number(-7.0).as_int32(), Some(-7));
        assert_eq!(Value::Number(1.5).as_int32(), None);
        assert_eq!(Value::Number(4e10).as_int32(), None);
        assert_eq!(Value::Nil.as_int32(), None);
    }
}
