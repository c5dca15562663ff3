//! Ember RT: the value model, a register VM, and the core environment every
//! ember program starts from.
//!
//! Start with [`Runtime::new`], or [`corelib::try_core_env`] when you manage
//! the [`vm::Vm`] yourself.
#![warn(clippy::all)]

pub mod args;
pub mod config;
pub mod corelib;
pub mod env;
pub mod eval;
pub mod fiber;
pub mod function;
pub mod libs;
pub mod marshal;
pub mod reader;
pub mod runtime;
pub mod scan;
pub mod symbols;
pub mod table;
pub mod value;
pub mod vm;

pub use config::RuntimeConfig;
pub use corelib::{core_env, native_env, try_core_env, BootError};
pub use env::Env;
pub use runtime::Runtime;
pub use value::Value;
pub use vm::{Vm, VmError};
