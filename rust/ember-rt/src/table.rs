//! Mutable tables and immutable structs.

use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::rc::Rc;

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Prototype chains deeper than this are treated as ending.
const MAX_PROTO_DEPTH: usize = 200;

/// Insertion-ordered hash table with an optional prototype.
///
/// Storing `nil` under a key removes the key; `nil` is never a key.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: FxIndexMap<Value, Value>,
    proto: Option<Rc<RefCell<Table>>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxIndexMap::with_capacity_and_hasher(capacity, Default::default()),
            proto: None,
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut table = Table::new();
        for (k, v) in pairs {
            table.put(k, v);
        }
        table
    }

    /// Lookup that falls back to the prototype chain.
    pub fn get(&self, key: &Value) -> Value {
        if let Some(v) = self.entries.get(key) {
            return v.clone();
        }
        let mut next = self.proto.clone();
        let mut depth = 0;
        while let Some(proto) = next {
            if depth >= MAX_PROTO_DEPTH {
                break;
            }
            let proto = proto.borrow();
            if let Some(v) = proto.entries.get(key) {
                return v.clone();
            }
            next = proto.proto.clone();
            depth += 1;
        }
        Value::Nil
    }

    /// Lookup in this table only.
    pub fn raw_get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: Value, value: Value) {
        if key.is_nil() {
            return;
        }
        if value.is_nil() {
            self.entries.shift_remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys()
    }

    /// Key following `key` in iteration order. `nil` starts the walk; the
    /// last key, or a key that is not present, yields `nil`.
    pub fn next_key(&self, key: &Value) -> Value {
        let index = if key.is_nil() {
            0
        } else {
            match self.entries.get_index_of(key) {
                Some(i) => i + 1,
                None => return Value::Nil,
            }
        };
        self.entries
            .get_index(index)
            .map(|(k, _)| k.clone())
            .unwrap_or(Value::Nil)
    }

    pub fn proto(&self) -> Option<&Rc<RefCell<Table>>> {
        self.proto.as_ref()
    }

    pub fn set_proto(&mut self, proto: Option<Rc<RefCell<Table>>>) {
        self.proto = proto;
    }
}

/// Immutable dictionary with entries sorted by the total value order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Struct {
    entries: Box<[(Value, Value)]>,
}

impl Struct {
    /// Builds a struct; `nil` keys and values are dropped and the last
    /// entry for a repeated key wins.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut raw: Vec<(Value, Value)> = pairs
            .into_iter()
            .filter(|(k, v)| !k.is_nil() && !v.is_nil())
            .collect();
        raw.sort_by(|a, b| a.0.compare(&b.0));
        let mut entries: Vec<(Value, Value)> = Vec::with_capacity(raw.len());
        for (k, v) in raw {
            match entries.last_mut() {
                Some(last) if last.0.compare(&k) == Ordering::Equal => *last = (k, v),
                _ => entries.push((k, v)),
            }
        }
        Self {
            entries: entries.into_boxed_slice(),
        }
    }

    pub fn get(&self, key: &Value) -> Value {
        self.entries
            .binary_search_by(|(k, _)| k.compare(key))
            .map(|i| self.entries[i].1.clone())
            .unwrap_or(Value::Nil)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Same contract as [`Table::next_key`].
    pub fn next_key(&self, key: &Value) -> Value {
        let index = if key.is_nil() {
            0
        } else {
            match self.entries.binary_search_by(|(k, _)| k.compare(key)) {
                Ok(i) => i + 1,
                Err(_) => return Value::Nil,
            }
        };
        self.entries
            .get(index)
            .map(|(k, _)| k.clone())
            .unwrap_or(Value::Nil)
    }
}

/// Hash of a value with the runtime's hasher, as exposed by `hash`.
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(s: &str) -> Value {
        Value::keyword(s)
    }

    #[test]
    fn test_put_nil_removes() {
        let mut t = Table::new();
        t.put(kw("a"), 1.into());
        t.put(kw("b"), 2.into());
        t.put(kw("a"), Value::Nil);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&kw("a")), Value::Nil);
        t.put(Value::Nil, 3.into());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_next_visits_each_key_once() {
        let mut t = Table::new();
        for i in 0..5 {
            t.put(Value::Number(i as f64), Value::Boolean(true));
        }
        let mut seen = Vec::new();
        let mut k = t.next_key(&Value::Nil);
        while !k.is_nil() {
            seen.push(k.clone());
            k = t.next_key(&k);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(t.next_key(&kw("missing")), Value::Nil);
        assert_eq!(Table::new().next_key(&Value::Nil), Value::Nil);
    }

    #[test]
    fn test_proto_lookup() {
        let base = Rc::new(RefCell::new(Table::from_pairs([(kw("x"), 1.into())])));
        let mut child = Table::new();
        child.set_proto(Some(base));
        assert_eq!(child.get(&kw("x")), Value::Number(1.0));
        assert!(child.raw_get(&kw("x")).is_none());
    }

    #[test]
    fn test_struct_sorts_and_dedups() {
        let s = Struct::from_pairs([
            (kw("b"), 1.into()),
            (kw("a"), 2.into()),
            (kw("b"), 3.into()),
            (kw("c"), Value::Nil),
        ]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(&kw("b")), Value::Number(3.0));
        let keys: Vec<_> = s.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![kw("a"), kw("b")]);
        assert_eq!(s.next_key(&kw("a")), kw("b"));
        assert_eq!(s.next_key(&kw("b")), Value::Nil);
    }

    #[test]
    fn test_struct_equality_ignores_order() {
        let a = Struct::from_pairs([(kw("x"), 1.into()), (kw("y"), 2.into())]);
        let b = Struct::from_pairs([(kw("y"), 2.into()), (kw("x"), 1.into())]);
        assert_eq!(a, b);
        assert_eq!(hash_value(&Value::structure(a)), hash_value(&Value::structure(b)));
    }
}
