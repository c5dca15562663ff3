//! Structural verification of instruction sequences.
//!
//! Checks the invariants every routine definition must satisfy before the VM
//! is allowed to run it: operands in range for the frame, jumps landing
//! inside the sequence, a terminating final instruction, and an arity that
//! fits the frame.

use crate::instruction::Instruction;
use crate::opcode::{Imm, Shape};
use thiserror::Error;

/// Frame and arity facts the verifier checks instructions against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub slot_count: u32,
    pub constant_count: usize,
    pub fixed_arity: u32,
    pub min_arity: u32,
    pub max_arity: Option<u32>,
    pub vararg: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("empty instruction sequence")]
    Empty,
    #[error("unknown opcode {opcode} at instruction {pc}")]
    UnknownOpcode { pc: usize, opcode: u8 },
    #[error("slot {slot} out of range at instruction {pc} (frame has {slot_count} slots)")]
    SlotOutOfRange { pc: usize, slot: u8, slot_count: u32 },
    #[error("jump at instruction {pc} targets {target}, outside 0..{len}")]
    JumpOutOfRange { pc: usize, target: i64, len: usize },
    #[error("constant {index} out of range at instruction {pc} ({count} constants)")]
    ConstantOutOfRange { pc: usize, index: u16, count: usize },
    #[error("sequence must end in a terminator, found `{0}`")]
    MissingTerminator(String),
    #[error("frame of {slot_count} slots cannot hold {needed} argument slots")]
    FrameTooSmall { slot_count: u32, needed: u32 },
    #[error("inconsistent arity: fixed {fixed}, min {min}, max {max:?}, vararg {vararg}")]
    BadArity {
        fixed: u32,
        min: u32,
        max: Option<u32>,
        vararg: bool,
    },
}

pub fn verify(code: &[Instruction], layout: &FrameLayout) -> Result<(), VerifyError> {
    verify_arity(layout)?;
    let last = code.last().ok_or(VerifyError::Empty)?;

    for (pc, ins) in code.iter().enumerate() {
        let op = ins.opcode().ok_or(VerifyError::UnknownOpcode {
            pc,
            opcode: ins.opcode_byte(),
        })?;
        let slots: &[u8] = match op.shape() {
            Shape::Empty | Shape::L(_) => &[],
            Shape::S | Shape::SI(_) => &[ins.a()],
            Shape::SS | Shape::SSI(_) => &[ins.a(), ins.b()],
            Shape::SSS => &[ins.a(), ins.b(), ins.c()],
        };
        for &slot in slots {
            if slot as u32 >= layout.slot_count {
                return Err(VerifyError::SlotOutOfRange {
                    pc,
                    slot,
                    slot_count: layout.slot_count,
                });
            }
        }
        if let Shape::SI(Imm::Constant) = op.shape() {
            let index = ins.imm16() as u16;
            if index as usize >= layout.constant_count {
                return Err(VerifyError::ConstantOutOfRange {
                    pc,
                    index,
                    count: layout.constant_count,
                });
            }
        }
        if let Some(offset) = ins.jump_offset() {
            let target = pc as i64 + offset as i64;
            if target < 0 || target >= code.len() as i64 {
                return Err(VerifyError::JumpOutOfRange {
                    pc,
                    target,
                    len: code.len(),
                });
            }
        }
    }

    match last.opcode() {
        Some(op) if op.is_terminator() => Ok(()),
        _ => Err(VerifyError::MissingTerminator(last.to_string())),
    }
}

fn verify_arity(layout: &FrameLayout) -> Result<(), VerifyError> {
    let bad = VerifyError::BadArity {
        fixed: layout.fixed_arity,
        min: layout.min_arity,
        max: layout.max_arity,
        vararg: layout.vararg,
    };
    if layout.vararg != layout.max_arity.is_none() {
        return Err(bad);
    }
    if let Some(max) = layout.max_arity {
        if layout.min_arity > max || layout.fixed_arity > max {
            return Err(bad);
        }
    }
    let needed = layout.fixed_arity + u32::from(layout.vararg);
    if needed > layout.slot_count {
        return Err(VerifyError::FrameTooSmall {
            slot_count: layout.slot_count,
            needed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    fn exact(n: u32, slots: u32) -> FrameLayout {
        FrameLayout {
            slot_count: slots,
            constant_count: 0,
            fixed_arity: n,
            min_arity: n,
            max_arity: Some(n),
            vararg: false,
        }
    }

    #[test]
    fn accepts_minimal_routine() {
        let code = [Instruction::ss(OpCode::Length, 0, 0), Instruction::s(OpCode::Return, 0)];
        assert_eq!(verify(&code, &exact(1, 1)), Ok(()));
    }

    #[test]
    fn rejects_slot_past_frame() {
        let code = [Instruction::sss(OpCode::Get, 0, 0, 1), Instruction::s(OpCode::Return, 0)];
        assert!(matches!(
            verify(&code, &exact(1, 1)),
            Err(VerifyError::SlotOutOfRange { pc: 0, slot: 1, .. })
        ));
    }

    #[test]
    fn rejects_jump_outside_sequence() {
        let code = [Instruction::si(OpCode::JumpIf, 0, 2), Instruction::s(OpCode::Return, 0)];
        assert!(matches!(
            verify(&code, &exact(1, 1)),
            Err(VerifyError::JumpOutOfRange { pc: 0, target: 2, len: 2 })
        ));
        let back = [Instruction::l(OpCode::Jump, -1)];
        assert!(matches!(
            verify(&back, &exact(0, 1)),
            Err(VerifyError::JumpOutOfRange { target: -1, .. })
        ));
    }

    #[test]
    fn rejects_fallthrough_end() {
        let code = [Instruction::s(OpCode::LoadNil, 0)];
        assert_eq!(
            verify(&code, &exact(0, 1)),
            Err(VerifyError::MissingTerminator("ldn 0".into()))
        );
    }

    #[test]
    fn rejects_constant_out_of_range() {
        let code = [Instruction::si(OpCode::LoadConstant, 0, 3), Instruction::s(OpCode::Return, 0)];
        assert!(matches!(
            verify(&code, &exact(0, 1)),
            Err(VerifyError::ConstantOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn vararg_needs_rest_slot_and_open_max() {
        let layout = FrameLayout {
            slot_count: 1,
            constant_count: 0,
            fixed_arity: 1,
            min_arity: 1,
            max_arity: None,
            vararg: true,
        };
        let code = [Instruction::op(OpCode::ReturnNil)];
        assert_eq!(
            verify(&code, &layout),
            Err(VerifyError::FrameTooSmall { slot_count: 1, needed: 2 })
        );
        let closed = FrameLayout { max_arity: Some(3), slot_count: 2, ..layout };
        assert!(matches!(verify(&code, &closed), Err(VerifyError::BadArity { .. })));
    }

    #[test]
    fn rejects_empty_and_unknown() {
        assert_eq!(verify(&[], &exact(0, 1)), Err(VerifyError::Empty));
        let code = [Instruction::from_word(0xEE)];
        assert!(matches!(
            verify(&code, &exact(0, 1)),
            Err(VerifyError::UnknownOpcode { opcode: 0xEE, .. })
        ));
    }
}
