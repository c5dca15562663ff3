//! Ways of finishing the core environment after the native part is built.
//!
//! Exactly one strategy is compiled in as [`DefaultBootstrap`]: evaluating
//! the boot source, or decoding a prebuilt image (`image-bootstrap`).

mod image;
mod source;

pub use image::ImageBootstrap;
pub use source::{SourceBootstrap, BOOT_SOURCE};

use super::BootError;
use crate::env::Env;
use crate::vm::Vm;

pub trait Bootstrap {
    /// Completes `env` and returns the environment programs should use.
    /// An image bootstrap returns a new table; the source bootstrap extends
    /// `env` itself.
    fn finish(&self, vm: &mut Vm, env: Env) -> Result<Env, BootError>;
}

#[cfg(feature = "image-bootstrap")]
pub type DefaultBootstrap = ImageBootstrap;

#[cfg(not(feature = "image-bootstrap"))]
pub type DefaultBootstrap = SourceBootstrap;

#[cfg(not(any(feature = "assembler", feature = "image-bootstrap")))]
compile_error!("the source bootstrap needs the `assembler` feature; enable it or `image-bootstrap`");
