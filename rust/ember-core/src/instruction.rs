//! 32-bit fixed-width instruction words.
//!
//! ```text
//! [31..24 c | imm8][23..16 b][15..8 a][7..0 op]     S, SS, SSS, SSI
//! [31..16 imm16   ][15..8 a][7..0 op]               SI
//! [31..8  imm24                ][7..0 op]           L
//! ```
//!
//! Immediates are two's complement. Every constructor is a pure `const fn`,
//! so instruction templates can be written as arrays of calls.

use crate::opcode::{Imm, OpCode, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One encoded instruction word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(u32);

impl Instruction {
    /// Opcode with no operands.
    pub const fn op(op: OpCode) -> Self {
        Self(op as u32)
    }

    pub const fn s(op: OpCode, a: u8) -> Self {
        Self(op as u32 | (a as u32) << 8)
    }

    pub const fn ss(op: OpCode, a: u8, b: u8) -> Self {
        Self(op as u32 | (a as u32) << 8 | (b as u32) << 16)
    }

    pub const fn sss(op: OpCode, a: u8, b: u8, c: u8) -> Self {
        Self(op as u32 | (a as u32) << 8 | (b as u32) << 16 | (c as u32) << 24)
    }

    /// Slot plus a wide (16-bit) immediate.
    pub const fn si(op: OpCode, a: u8, imm: i16) -> Self {
        Self(op as u32 | (a as u32) << 8 | (imm as u16 as u32) << 16)
    }

    /// Two slots plus a narrow (8-bit) immediate.
    pub const fn ssi(op: OpCode, a: u8, b: u8, imm: i8) -> Self {
        Self(op as u32 | (a as u32) << 8 | (b as u32) << 16 | (imm as u8 as u32) << 24)
    }

    /// A 24-bit immediate. Bits above 24 are discarded.
    pub const fn l(op: OpCode, imm: i32) -> Self {
        Self(op as u32 | (imm as u32) << 8)
    }

    pub const fn from_word(word: u32) -> Self {
        Self(word)
    }

    pub const fn word(self) -> u32 {
        self.0
    }

    pub const fn opcode_byte(self) -> u8 {
        self.0 as u8
    }

    pub fn opcode(self) -> Option<OpCode> {
        OpCode::from_repr(self.opcode_byte())
    }

    pub const fn a(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn c(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn imm16(self) -> i16 {
        (self.0 >> 16) as u16 as i16
    }

    pub const fn imm8(self) -> i8 {
        (self.0 >> 24) as u8 as i8
    }

    pub const fn imm24(self) -> i32 {
        (self.0 as i32) >> 8
    }

    /// The relative jump offset, if this is a jump.
    pub fn jump_offset(self) -> Option<i32> {
        match self.opcode()?.shape() {
            Shape::SI(Imm::Jump) => Some(self.imm16() as i32),
            Shape::L(Imm::Jump) => Some(self.imm24()),
            _ => None,
        }
    }

    /// Operands in assembly order, decoded per the opcode's shape.
    pub fn operands(self) -> Vec<i32> {
        let Some(op) = self.opcode() else {
            return Vec::new();
        };
        match op.shape() {
            Shape::Empty => vec![],
            Shape::S => vec![self.a() as i32],
            Shape::SS => vec![self.a() as i32, self.b() as i32],
            Shape::SSS => vec![self.a() as i32, self.b() as i32, self.c() as i32],
            Shape::SI(Imm::Constant) => vec![self.a() as i32, self.imm16() as u16 as i32],
            Shape::SI(_) => vec![self.a() as i32, self.imm16() as i32],
            Shape::SSI(Imm::Index | Imm::Signal) => {
                vec![self.a() as i32, self.b() as i32, self.c() as i32]
            }
            Shape::SSI(_) => vec![self.a() as i32, self.b() as i32, self.imm8() as i32],
            Shape::L(_) => vec![self.imm24()],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode() {
            Some(op) => {
                write!(f, "{}", op.mnemonic())?;
                for operand in self.operands() {
                    write!(f, " {}", operand)?;
                }
                Ok(())
            }
            None => write!(f, "<illegal 0x{:08x}>", self.0),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction(0x{:08x} {})", self.0, self)
    }
}

impl From<Instruction> for u32 {
    fn from(ins: Instruction) -> u32 {
        ins.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_slot_layout() {
        let ins = Instruction::sss(OpCode::Add, 3, 3, 4);
        assert_eq!(ins.word(), 6 | 3 << 8 | 3 << 16 | 4 << 24);
        assert_eq!((ins.a(), ins.b(), ins.c()), (3, 3, 4));
        assert_eq!(ins.opcode(), Some(OpCode::Add));
    }

    #[test]
    fn wide_immediate_is_signed() {
        let ins = Instruction::si(OpCode::JumpIfNot, 2, -4);
        assert_eq!(ins.a(), 2);
        assert_eq!(ins.imm16(), -4);
        assert_eq!(ins.jump_offset(), Some(-4));
    }

    #[test]
    fn narrow_immediate_is_signed() {
        let ins = Instruction::ssi(OpCode::AddImmediate, 5, 5, -1);
        assert_eq!(ins.imm8(), -1);
        assert_eq!(ins.c(), 0xFF);
        assert_eq!(ins.to_string(), "addim 5 5 -1");
    }

    #[test]
    fn jump_immediate_spans_24_bits() {
        let ins = Instruction::l(OpCode::Jump, -5);
        assert_eq!(ins.word(), OpCode::Jump as u32 | ((-5i32 as u32) << 8));
        assert_eq!(ins.imm24(), -5);
        let far = Instruction::l(OpCode::Jump, 0x7F_FFFF);
        assert_eq!(far.imm24(), 0x7F_FFFF);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(
            Instruction::ssi(OpCode::GetIndex, 4, 0, 0),
            Instruction::ssi(OpCode::GetIndex, 4, 0, 0)
        );
        assert_eq!(Instruction::s(OpCode::Return, 0), Instruction::op(OpCode::Return));
    }

    #[test]
    fn illegal_opcode_displays_raw_word() {
        let ins = Instruction::from_word(0xFF);
        assert_eq!(ins.opcode(), None);
        assert_eq!(ins.to_string(), "<illegal 0x000000ff>");
    }

    #[test]
    fn constant_index_displays_unsigned() {
        let ins = Instruction::si(OpCode::LoadConstant, 1, -1);
        assert_eq!(ins.operands(), vec![1, 0xFFFF]);
    }
}
