//! Symbol interning and fresh-symbol generation.
//!
//! Every symbol value is created through the per-thread cache, so `gensym`
//! can guarantee a name no live symbol already uses.

use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::rc::Rc;

/// Intern table for symbol names.
#[derive(Debug, Default)]
pub struct SymbolCache {
    names: FxHashSet<Rc<[u8]>>,
    next_gensym: u64,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &[u8]) -> Rc<[u8]> {
        if let Some(existing) = self.names.get(name) {
            return existing.clone();
        }
        let sym: Rc<[u8]> = Rc::from(name);
        self.names.insert(sym.clone());
        sym
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.names.contains(name)
    }

    /// A new symbol of the form `_NNNNNN` that has never been interned.
    pub fn gensym(&mut self) -> Rc<[u8]> {
        loop {
            self.next_gensym += 1;
            let candidate = format!("_{:06}", self.next_gensym);
            if !self.contains(candidate.as_bytes()) {
                return self.intern(candidate.as_bytes());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

thread_local! {
    static CACHE: RefCell<SymbolCache> = RefCell::new(SymbolCache::new());
}

pub fn intern(name: &[u8]) -> Rc<[u8]> {
    CACHE.with(|c| c.borrow_mut().intern(name))
}

pub fn gensym() -> Rc<[u8]> {
    CACHE.with(|c| c.borrow_mut().gensym())
}
