//! Ember Core
//!
//! Instruction encoding, opcode metadata, intrinsic tags, and the bytecode
//! verifier shared by the runtime and its tools.

pub mod instruction;
pub mod intrinsic;
pub mod opcode;
pub mod verify;

pub use instruction::Instruction;
pub use intrinsic::Intrinsic;
pub use opcode::{Imm, OpCode, Shape, SignalCode};
pub use verify::{verify, FrameLayout, VerifyError};
