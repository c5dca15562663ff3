use super::Bootstrap;
use crate::corelib::BootError;
use crate::env::Env;
use crate::marshal::{self, MarshalError};
use crate::vm::Vm;
use std::borrow::Cow;

#[cfg(feature = "image-bootstrap")]
static CORE_IMAGE: &[u8] = include_bytes!(env!("EMBER_CORE_IMAGE"));

/// Decodes a prebuilt core image against the native environment.
///
/// Native routines are stored in the image by name and resolved through
/// the bindings of the environment passed to [`Bootstrap::finish`], which
/// must come from the same build that wrote the image.
#[derive(Debug, Clone)]
pub struct ImageBootstrap {
    bytes: Cow<'static, [u8]>,
}

impl ImageBootstrap {
    pub fn from_bytes(bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[cfg(feature = "image-bootstrap")]
impl Default for ImageBootstrap {
    fn default() -> Self {
        Self::from_bytes(CORE_IMAGE)
    }
}

impl Bootstrap for ImageBootstrap {
    fn finish(&self, vm: &mut Vm, env: Env) -> Result<Env, BootError> {
        let lookup = marshal::env_lookup(&env);
        let decoded = marshal::unmarshal(&self.bytes, &lookup)?;
        let core = Env::from_value(&decoded)
            .ok_or_else(|| MarshalError::Decode(format!("image root is a {}", decoded.type_name())))?;
        // The decode context is superseded; unroot it and break its `_env` cycle.
        vm.gc_unroot(&env.to_value());
        env.undef("_env");
        vm.gc_root(core.to_value());
        vm.set_root_env(core.clone());
        tracing::debug!(bytes = self.bytes.len(), bindings = core.len(), "core image loaded");
        Ok(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corelib::{make_image, native_env};

    #[test]
    fn test_native_context_is_released() {
        let bytes = make_image(&mut Vm::default()).unwrap();
        let mut vm = Vm::default();
        let native = native_env(&mut vm, None).unwrap();
        let table = std::rc::Rc::downgrade(native.table());
        let core = ImageBootstrap::from_bytes(bytes).finish(&mut vm, native).unwrap();
        assert!(table.upgrade().is_none());
        assert!(vm.root_env().is_some_and(|root| root.ptr_eq(&core)));
        assert_eq!(vm.gc_roots().len(), 1);
    }
}
