//! Environments: tables mapping symbols to binding structs.
//!
//! A binding is the struct `{:value v :doc "..." :source-map ("file" line col)}`.
//! Redefining a name replaces its binding.

use crate::table::{Struct, Table};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// Decoded view of a binding struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub value: Value,
    pub doc: Option<String>,
    pub source: Option<SourceLoc>,
}

/// Shared handle to an environment table.
#[derive(Debug, Clone, Default)]
pub struct Env(Rc<RefCell<Table>>);

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Rc<RefCell<Table>>) -> Self {
        Self(table)
    }

    /// The environment from a table value, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Table(t) => Some(Self(t.clone())),
            _ => None,
        }
    }

    pub fn table(&self) -> &Rc<RefCell<Table>> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Table(self.0.clone())
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn def(&self, name: &str, value: Value, doc: Option<&str>) {
        self.define(name, value, doc, None);
    }

    pub fn define(&self, name: &str, value: Value, doc: Option<&str>, source: Option<&SourceLoc>) {
        let mut pairs = vec![(Value::keyword("value"), value)];
        if let Some(doc) = doc {
            pairs.push((Value::keyword("doc"), Value::string(doc)));
        }
        if let Some(loc) = source {
            pairs.push((
                Value::keyword("source-map"),
                Value::tuple(vec![
                    Value::string(&loc.file),
                    Value::Number(loc.line as f64),
                    Value::Number(loc.column as f64),
                ]),
            ));
        }
        self.0
            .borrow_mut()
            .put(Value::symbol(name), Value::structure(Struct::from_pairs(pairs)));
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        let raw = self.0.borrow().get(&Value::symbol(name));
        decode_binding(&raw)
    }

    /// Removes the binding for `name`. Returns whether there was one.
    pub fn undef(&self, name: &str) -> bool {
        self.0.borrow_mut().remove(&Value::symbol(name)).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.binding(name).map(|b| b.value)
    }

    pub fn doc(&self, name: &str) -> Option<String> {
        self.binding(name).and_then(|b| b.doc)
    }

    /// Names bound directly in this environment, sorted.
    pub fn names(&self) -> Vec<String> {
        let table = self.0.borrow();
        let mut names: Vec<String> = table
            .keys()
            .filter_map(|k| match k {
                Value::Symbol(s) => Some(String::from_utf8_lossy(s).into_owned()),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

pub fn decode_binding(raw: &Value) -> Option<Binding> {
    let fields = |key: &str| match raw {
        Value::Struct(s) => s.get(&Value::keyword(key)),
        Value::Table(t) => t.borrow().get(&Value::keyword(key)),
        _ => Value::Nil,
    };
    if !matches!(raw, Value::Struct(_) | Value::Table(_)) {
        return None;
    }
    let doc = match fields("doc") {
        Value::String(s) => Some(String::from_utf8_lossy(&s).into_owned()),
        _ => None,
    };
    let source = match fields("source-map") {
        Value::Tuple(t) if t.len() == 3 => match (&t[0], t[1].as_index(), t[2].as_index()) {
            (Value::String(file), Some(line), Some(column)) => Some(SourceLoc {
                file: String::from_utf8_lossy(file).into_owned(),
                line: line as u32,
                column: column as u32,
            }),
            _ => None,
        },
        _ => None,
    };
    Some(Binding {
        value: fields("value"),
        doc,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_def_and_lookup() {
        let env = Env::new();
        env.def("answer", 42.into(), Some("The answer."));
        assert_eq!(env.lookup("answer"), Some(Value::Number(42.0)));
        assert_eq!(env.doc("answer").as_deref(), Some("The answer."));
        assert_eq!(env.lookup("missing"), None);
    }

    #[test]
    fn test_redefinition_shadows() {
        let env = Env::new();
        env.def("x", 1.into(), None);
        env.def("x", 2.into(), Some("second"));
        assert_eq!(env.len(), 1);
        assert_eq!(env.lookup("x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_source_map_round_trips() {
        let env = Env::new();
        let loc = SourceLoc {
            file: "boot/core.ember".into(),
            line: 3,
            column: 1,
        };
        env.define("f", Value::Nil, None, Some(&loc));
        let binding = env.binding("f").unwrap();
        assert_eq!(binding.source, Some(loc));
        assert_eq!(binding.value, Value::Nil);
    }

    #[test]
    fn test_names_sorted() {
        let env = Env::new();
        env.def("b", 1.into(), None);
        env.def("a", 1.into(), None);
        assert_eq!(env.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
