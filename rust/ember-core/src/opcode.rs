//! Opcodes for the Ember register VM and the operand layout of each.

use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Opcodes for the Ember register VM.
///
/// The `strum` serialization is the assembler mnemonic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
    FromRepr,
)]
#[repr(u8)]
pub enum OpCode {
    #[strum(serialize = "noop")]
    Noop = 0, // no operands
    #[strum(serialize = "err")]
    Error = 1, // A: raise the value in A as an error
    #[strum(serialize = "sig")]
    Signal = 2, // A, B, C: raise signal C carrying B, resume value lands in A
    #[strum(serialize = "ret")]
    Return = 3, // A: return A
    #[strum(serialize = "retn")]
    ReturnNil = 4, // return nil

    // Arithmetic
    #[strum(serialize = "addim")]
    AddImmediate = 5, // A, B, I8: A = B + I
    #[strum(serialize = "add")]
    Add = 6, // A, B, C: A = B + C
    #[strum(serialize = "sub")]
    Subtract = 7, // A, B, C: A = B - C
    #[strum(serialize = "mul")]
    Multiply = 8, // A, B, C: A = B * C
    #[strum(serialize = "div")]
    Divide = 9, // A, B, C: A = B / C

    // Bitwise
    #[strum(serialize = "band")]
    BAnd = 10, // A, B, C: A = B & C
    #[strum(serialize = "bor")]
    BOr = 11, // A, B, C: A = B | C
    #[strum(serialize = "bxor")]
    BXor = 12, // A, B, C: A = B ^ C
    #[strum(serialize = "bnot")]
    BNot = 13, // A, B: A = ~B
    #[strum(serialize = "sl")]
    ShiftLeft = 14, // A, B, C: A = B << C
    #[strum(serialize = "sr")]
    ShiftRight = 15, // A, B, C: A = B >> C (arithmetic)
    #[strum(serialize = "sru")]
    ShiftRightUnsigned = 16, // A, B, C: A = B >>> C (logical)

    // Moves and jumps
    #[strum(serialize = "movn")]
    MoveNear = 17, // A, B: A = B
    #[strum(serialize = "jmp")]
    Jump = 18, // L: pc += L
    #[strum(serialize = "jmpif")]
    JumpIf = 19, // A, I16: if A then pc += I
    #[strum(serialize = "jmpno")]
    JumpIfNot = 20, // A, I16: if not A then pc += I

    // Total-order comparison
    #[strum(serialize = "gt")]
    GreaterThan = 21, // A, B, C: A = B > C
    #[strum(serialize = "lt")]
    LessThan = 22, // A, B, C: A = B < C
    #[strum(serialize = "eq")]
    Equals = 23, // A, B, C: A = B == C
    #[strum(serialize = "eqim")]
    EqualsImmediate = 24, // A, B, I8: A = B == I
    #[strum(serialize = "ltim")]
    LessThanImmediate = 25, // A, B, I8: A = B < I

    // Numeric comparison
    #[strum(serialize = "ngt")]
    NumericGreaterThan = 26,
    #[strum(serialize = "ngte")]
    NumericGreaterThanEqual = 27,
    #[strum(serialize = "nlt")]
    NumericLessThan = 28,
    #[strum(serialize = "nlte")]
    NumericLessThanEqual = 29,
    #[strum(serialize = "neq")]
    NumericEqual = 30,

    // Loads
    #[strum(serialize = "ldn")]
    LoadNil = 31, // A: A = nil
    #[strum(serialize = "ldt")]
    LoadTrue = 32, // A: A = true
    #[strum(serialize = "ldf")]
    LoadFalse = 33, // A: A = false
    #[strum(serialize = "ldi")]
    LoadInteger = 34, // A, I16: A = I
    #[strum(serialize = "ldc")]
    LoadConstant = 35, // A, K16: A = constants[K]
    #[strum(serialize = "ldself")]
    LoadSelf = 36, // A: A = the running function

    // Calls
    #[strum(serialize = "push")]
    Push = 37, // A: push A onto the pending argument list
    #[strum(serialize = "push2")]
    Push2 = 38, // A, B: push A then B
    #[strum(serialize = "pusha")]
    PushArray = 39, // A: push every element of A
    #[strum(serialize = "call")]
    Call = 40, // A, B: A = B(pending...)
    #[strum(serialize = "tcall")]
    TailCall = 41, // A: return A(pending...), reusing the frame
    #[strum(serialize = "res")]
    Resume = 42, // A, B, C: A = resume fiber B with C

    // Data structures
    #[strum(serialize = "get")]
    Get = 43, // A, B, C: A = B[C]
    #[strum(serialize = "put")]
    Put = 44, // A, B, C: A[B] = C
    #[strum(serialize = "geti")]
    GetIndex = 45, // A, B, U8: A = B[U]
    #[strum(serialize = "len")]
    Length = 46, // A, B: A = length(B)
    #[strum(serialize = "mkarr")]
    MakeArray = 47, // A: A = array of pending arguments
    #[strum(serialize = "mktup")]
    MakeTuple = 48, // A: A = tuple of pending arguments
}

/// What an immediate field means to the verifier and the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imm {
    /// Plain signed integer.
    Integer,
    /// Index into the constant pool.
    Constant,
    /// Relative jump, in instructions, from the jump itself.
    Jump,
    /// Unsigned element index.
    Index,
    /// Signal code.
    Signal,
}

/// Operand layout of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Opcode only.
    Empty,
    /// One slot.
    S,
    /// Two slots.
    SS,
    /// Three slots.
    SSS,
    /// One slot plus a 16-bit immediate.
    SI(Imm),
    /// Two slots plus an 8-bit immediate.
    SSI(Imm),
    /// A 24-bit immediate.
    L(Imm),
}

impl Shape {
    /// Number of operands written in assembly for this shape.
    pub fn operand_count(self) -> usize {
        match self {
            Shape::Empty => 0,
            Shape::S | Shape::L(_) => 1,
            Shape::SS | Shape::SI(_) => 2,
            Shape::SSS | Shape::SSI(_) => 3,
        }
    }
}

impl OpCode {
    pub fn shape(self) -> Shape {
        use OpCode::*;
        match self {
            Noop | ReturnNil => Shape::Empty,
            Error | Return | LoadNil | LoadTrue | LoadFalse | LoadSelf | Push | PushArray
            | TailCall | MakeArray | MakeTuple => Shape::S,
            BNot | MoveNear | Push2 | Call | Length => Shape::SS,
            Add | Subtract | Multiply | Divide | BAnd | BOr | BXor | ShiftLeft | ShiftRight
            | ShiftRightUnsigned | GreaterThan | LessThan | Equals | NumericGreaterThan
            | NumericGreaterThanEqual | NumericLessThan | NumericLessThanEqual | NumericEqual
            | Resume | Get | Put => Shape::SSS,
            JumpIf | JumpIfNot => Shape::SI(Imm::Jump),
            LoadInteger => Shape::SI(Imm::Integer),
            LoadConstant => Shape::SI(Imm::Constant),
            AddImmediate | EqualsImmediate | LessThanImmediate => Shape::SSI(Imm::Integer),
            GetIndex => Shape::SSI(Imm::Index),
            Signal => Shape::SSI(Imm::Signal),
            Jump => Shape::L(Imm::Jump),
        }
    }

    /// Assembler mnemonic.
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Whether control can never fall through past this instruction.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            OpCode::Return | OpCode::ReturnNil | OpCode::Jump | OpCode::TailCall | OpCode::Error
        )
    }
}

/// Signal codes carried by [`OpCode::Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum SignalCode {
    Ok = 0,
    Error = 1,
    Debug = 2,
    Yield = 3,
}
