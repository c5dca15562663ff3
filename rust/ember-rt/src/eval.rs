//! Tree-walking evaluator for boot source.
//!
//! Understands just enough to finish the core environment: `def`, `quote`,
//! `do`, `if`, literals, symbol lookup, and calls. Everything else is a
//! function bound in the environment.

use crate::env::{Env, SourceLoc};
use crate::reader::{self, Form, FormKind, MAX_NESTING};
use crate::table::{Struct, Table};
use crate::value::Value;
use crate::vm::{Vm, VmError};

pub struct Evaluator<'a> {
    vm: &'a mut Vm,
    env: Env,
    file: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(vm: &'a mut Vm, env: Env, file: impl Into<String>) -> Self {
        Self {
            vm,
            env,
            file: file.into(),
        }
    }

    /// Evaluates every form in `src`, returning the last result.
    pub fn eval_source(&mut self, src: &str) -> Result<Value, VmError> {
        let forms = reader::parse_all(src).map_err(|e| VmError::Runtime(e.to_string()))?;
        let mut last = Value::Nil;
        for form in &forms {
            last = self.eval(form)?;
        }
        Ok(last)
    }

    /// Evaluates one form. Nesting is counted on the VM, so source that
    /// evaluates more source through `eval-string` shares one bound.
    pub fn eval(&mut self, form: &Form) -> Result<Value, VmError> {
        if self.vm.eval_depth >= MAX_NESTING {
            return Err(VmError::Runtime(format!(
                "evaluation nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.vm.eval_depth += 1;
        let result = self.eval_form(form);
        self.vm.eval_depth -= 1;
        result
    }

    fn eval_form(&mut self, form: &Form) -> Result<Value, VmError> {
        match &form.kind {
            FormKind::Atom(Value::Symbol(name)) => {
                let name = String::from_utf8_lossy(name);
                self.env
                    .binding(&name)
                    .map(|b| b.value)
                    .ok_or_else(|| VmError::Runtime(format!("unknown symbol {}", name)))
            }
            FormKind::Atom(v) => Ok(v.clone()),
            FormKind::Buffer(b) => Ok(Value::buffer(b.clone())),
            FormKind::Quote(inner) => Ok(inner.to_value()),
            FormKind::Brackets(items) => Ok(Value::tuple(self.eval_all(items)?)),
            FormKind::Array(items) => Ok(Value::array(self.eval_all(items)?)),
            FormKind::Struct(items) => Ok(Value::structure(Struct::from_pairs(self.eval_pairs(items)?))),
            FormKind::Table(items) => Ok(Value::table(Table::from_pairs(self.eval_pairs(items)?))),
            FormKind::List(items) => self.eval_list(form, items),
        }
    }

    fn eval_all(&mut self, items: &[Form]) -> Result<Vec<Value>, VmError> {
        items.iter().map(|f| self.eval(f)).collect()
    }

    fn eval_pairs(&mut self, items: &[Form]) -> Result<Vec<(Value, Value)>, VmError> {
        if items.len() % 2 != 0 {
            return Err(VmError::Runtime(
                "dictionary literal expects an even number of forms".into(),
            ));
        }
        items
            .chunks_exact(2)
            .map(|kv| -> Result<(Value, Value), VmError> {
                Ok((self.eval(&kv[0])?, self.eval(&kv[1])?))
            })
            .collect()
    }

    fn eval_list(&mut self, form: &Form, items: &[Form]) -> Result<Value, VmError> {
        let Some(head) = items.first() else {
            return Ok(Value::tuple(Vec::new()));
        };
        match head.symbol_name() {
            Some(b"def") => self.eval_def(form, &items[1..]),
            Some(b"quote") => match items {
                [_, inner] => Ok(inner.to_value()),
                _ => Err(VmError::Runtime("quote expects one form".into())),
            },
            Some(b"do") => {
                let mut last = Value::Nil;
                for f in &items[1..] {
                    last = self.eval(f)?;
                }
                Ok(last)
            }
            Some(b"if") => match items {
                [_, cond, then] | [_, cond, then, _] => {
                    if self.eval(cond)?.truthy() {
                        self.eval(then)
                    } else if let [_, _, _, otherwise] = items {
                        self.eval(otherwise)
                    } else {
                        Ok(Value::Nil)
                    }
                }
                _ => Err(VmError::Runtime("if expects 2 or 3 forms".into())),
            },
            _ => {
                let callee = self.eval(head)?;
                let args = self.eval_all(&items[1..])?;
                self.vm.call(&callee, &args)
            }
        }
    }

    /// `(def name value)` or `(def name "doc" value)`.
    fn eval_def(&mut self, form: &Form, rest: &[Form]) -> Result<Value, VmError> {
        let (name, doc, value) = match rest {
            [name, value] => (name, None, value),
            [name, doc, value] => match &doc.kind {
                FormKind::Atom(Value::String(s)) => {
                    (name, Some(String::from_utf8_lossy(s).into_owned()), value)
                }
                _ => return Err(VmError::Runtime("def docstring must be a string".into())),
            },
            _ => return Err(VmError::Runtime("def expects a name and a value".into())),
        };
        let name = name
            .symbol_name()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .ok_or_else(|| VmError::Runtime("def expects a symbol name".into()))?;
        let value = self.eval(value)?;
        let loc = SourceLoc {
            file: self.file.clone(),
            line: form.line,
            column: form.column,
        };
        self.env.define(&name, value.clone(), doc.as_deref(), Some(&loc));
        Ok(value)
    }
}
