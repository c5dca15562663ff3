//! Building primitives straight from instruction words.

use super::BootError;
use crate::env::Env;
use crate::function::{Arity, FuncDef, FuncFlags, Function};
use crate::value::Value;
use ember_core::Instruction;
use std::rc::Rc;

/// Assembles `bytecode` into a function and binds it in `env` under `name`,
/// replacing any earlier binding. The definition must pass verification.
#[allow(clippy::too_many_arguments)]
pub fn quick_asm(
    env: &Env,
    flags: FuncFlags,
    name: &str,
    arity: u32,
    min_arity: u32,
    max_arity: Option<u32>,
    slot_count: u32,
    bytecode: &[Instruction],
    doc: &str,
) -> Result<Rc<Function>, BootError> {
    let def = FuncDef {
        name: name.to_string(),
        doc: Some(doc.to_string()),
        flags,
        arity: Arity {
            fixed: arity,
            min: min_arity,
            max: max_arity,
        },
        slot_count,
        bytecode: bytecode.to_vec(),
        constants: Vec::new(),
    };
    def.verify().map_err(|source| BootError::Assemble {
        name: name.to_string(),
        source,
    })?;
    let func = Function::new(def);
    env.def(name, Value::Function(func.clone()), Some(doc));
    tracing::trace!(name, instructions = bytecode.len(), "assembled primitive");
    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::OpCode;

    #[test]
    fn test_binds_and_overwrites() {
        let env = Env::new();
        let code = [Instruction::ss(OpCode::Length, 0, 0), Instruction::s(OpCode::Return, 0)];
        quick_asm(&env, FuncFlags::default(), "length", 1, 1, Some(1), 1, &code, "first").unwrap();
        quick_asm(&env, FuncFlags::default(), "length", 1, 1, Some(1), 1, &code, "second").unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.doc("length").as_deref(), Some("second"));
    }

    #[test]
    fn test_rejects_invalid_sequence() {
        let env = Env::new();
        let code = [Instruction::s(OpCode::Return, 4)];
        let err = quick_asm(&env, FuncFlags::default(), "bad", 0, 0, Some(0), 1, &code, "").unwrap_err();
        assert!(matches!(err, BootError::Assemble { ref name, .. } if name == "bad"));
        assert!(env.is_empty());
    }
}
