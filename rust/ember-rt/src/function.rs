//! Routine definitions and function values.

use crate::value::Value;
use ember_core::{FrameLayout, Instruction, Intrinsic, VerifyError};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FuncFlags {
    /// Extra arguments are collected into a tuple in the slot after the
    /// fixed parameters.
    pub vararg: bool,
    /// Set only on the hand-assembled primitives.
    pub intrinsic: Option<Intrinsic>,
}

impl FuncFlags {
    pub const fn vararg() -> Self {
        Self {
            vararg: true,
            intrinsic: None,
        }
    }

    pub const fn with_intrinsic(self, intrinsic: Intrinsic) -> Self {
        Self {
            intrinsic: Some(intrinsic),
            ..self
        }
    }
}

/// Arity of a routine. `max` is `None` exactly when the routine is vararg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arity {
    pub fixed: u32,
    pub min: u32,
    pub max: Option<u32>,
}

impl Arity {
    pub const fn exact(n: u32) -> Self {
        Self {
            fixed: n,
            min: n,
            max: Some(n),
        }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min as usize && !matches!(self.max, Some(max) if argc > max as usize)
    }

    pub fn describe(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("{}", max),
            Some(max) => format!("{} to {}", self.min, max),
            None => format!("at least {}", self.min),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub doc: Option<String>,
    pub flags: FuncFlags,
    pub arity: Arity,
    pub slot_count: u32,
    pub bytecode: Vec<Instruction>,
    pub constants: Vec<Value>,
}

impl FuncDef {
    pub fn layout(&self) -> FrameLayout {
        FrameLayout {
            slot_count: self.slot_count,
            constant_count: self.constants.len(),
            fixed_arity: self.arity.fixed,
            min_arity: self.arity.min,
            max_arity: self.arity.max,
            vararg: self.flags.vararg,
        }
    }

    pub fn verify(&self) -> Result<(), VerifyError> {
        ember_core::verify(&self.bytecode, &self.layout())
    }

    /// One instruction per line, prefixed with its index.
    pub fn disassemble(&self) -> String {
        self.bytecode
            .iter()
            .enumerate()
            .map(|(pc, ins)| format!("{:4}  {}\n", pc, ins))
            .collect()
    }
}

/// A callable bytecode function.
#[derive(Debug)]
pub struct Function {
    pub def: Rc<FuncDef>,
}

impl Function {
    pub fn new(def: FuncDef) -> Rc<Self> {
        Rc::new(Self { def: Rc::new(def) })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn intrinsic(&self) -> Option<Intrinsic> {
        self.def.flags.intrinsic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::OpCode;

    #[test]
    fn test_arity_accepts() {
        let exact = Arity::exact(2);
        assert!(exact.accepts(2));
        assert!(!exact.accepts(1));
        assert!(!exact.accepts(3));
        let open = Arity {
            fixed: 1,
            min: 1,
            max: None,
        };
        assert!(open.accepts(10));
        assert!(!open.accepts(0));
        assert_eq!(open.describe(), "at least 1");
    }

    #[test]
    fn test_layout_matches_definition() {
        let def = FuncDef {
            name: "length".into(),
            doc: None,
            flags: FuncFlags::default().with_intrinsic(Intrinsic::Length),
            arity: Arity::exact(1),
            slot_count: 1,
            bytecode: vec![
                Instruction::ss(OpCode::Length, 0, 0),
                Instruction::s(OpCode::Return, 0),
            ],
            constants: vec![],
        };
        assert_eq!(def.verify(), Ok(()));
        assert_eq!(def.disassemble(), "   0  len 0 0\n   1  ret 0\n");
    }
}
