//! Native module loading.
//!
//! A native module is a dynamic library exporting `_ember_init`, a Rust
//! function of type [`ModuleInit`]. It must be built with the same compiler
//! and `ember-rt` version as the host. Loaded libraries are kept open for
//! the rest of the process.

use crate::env::Env;
use std::path::Path;
use thiserror::Error;

/// Entry symbol every native module exports.
pub const ENTRY_SYMBOL: &str = "_ember_init";

/// Signature of the entry symbol.
pub type ModuleInit = fn(&Env);

#[derive(Debug, Error)]
pub enum NativeError {
    #[error("could not load native module {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("native module {path} does not export `{symbol}`")]
    MissingEntry { path: String, symbol: &'static str },
}

/// A backend able to open a module and resolve its entry point.
pub trait ModuleLoader {
    fn open(&self, path: &Path) -> Result<ModuleInit, NativeError>;
}

/// Opens `path` with `loader` and runs its entry point against `env`, or
/// against a fresh environment when none is given. On failure no
/// environment is touched.
pub fn load_with<L: ModuleLoader + ?Sized>(
    loader: &L,
    path: &Path,
    env: Option<Env>,
) -> Result<Env, NativeError> {
    let init = loader.open(path)?;
    let env = env.unwrap_or_default();
    init(&env);
    tracing::debug!(path = %path.display(), bindings = env.len(), "native module initialised");
    Ok(env)
}

/// [`load_with`] using the backend selected for this build.
pub fn load(path: &Path, env: Option<Env>) -> Result<Env, NativeError> {
    load_with(&PlatformLoader::default(), path, env)
}

#[cfg(all(feature = "dynamic-modules", any(unix, windows)))]
pub type PlatformLoader = dynamic::DlLoader;

#[cfg(not(all(feature = "dynamic-modules", any(unix, windows))))]
pub type PlatformLoader = DisabledLoader;

/// Backend for builds without dynamic library support.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLoader;

impl ModuleLoader for DisabledLoader {
    fn open(&self, path: &Path) -> Result<ModuleInit, NativeError> {
        Err(NativeError::Load {
            path: path.display().to_string(),
            reason: "dynamic libraries not supported".into(),
        })
    }
}

#[cfg(all(feature = "dynamic-modules", any(unix, windows)))]
pub mod dynamic {
    use super::{ModuleInit, ModuleLoader, NativeError, ENTRY_SYMBOL};
    use libloading::Library;
    use once_cell::sync::Lazy;
    use std::path::Path;
    use std::sync::Mutex;

    /// Libraries stay mapped for the life of the process.
    static LIBRARIES: Lazy<Mutex<Vec<Library>>> = Lazy::new(|| Mutex::new(Vec::new()));

    /// `dlopen(RTLD_NOW)` on POSIX, `LoadLibrary` on Windows.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct DlLoader;

    #[cfg(unix)]
    fn open_library(path: &Path) -> Result<Library, libloading::Error> {
        use libloading::os::unix;
        // SAFETY: running library initialisers is the purpose of loading a module.
        unsafe { unix::Library::open(Some(path), unix::RTLD_NOW).map(Library::from) }
    }

    #[cfg(windows)]
    fn open_library(path: &Path) -> Result<Library, libloading::Error> {
        // SAFETY: as above.
        unsafe { Library::new(path) }
    }

    impl ModuleLoader for DlLoader {
        fn open(&self, path: &Path) -> Result<ModuleInit, NativeError> {
            let lib = open_library(path).map_err(|e| NativeError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            // SAFETY: the entry symbol is declared with the `ModuleInit` signature.
            let init = unsafe { lib.get::<ModuleInit>(ENTRY_SYMBOL.as_bytes()) }
                .map(|sym| *sym)
                .map_err(|_| NativeError::MissingEntry {
                    path: path.display().to_string(),
                    symbol: ENTRY_SYMBOL,
                })?;
            LIBRARIES
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(lib);
            tracing::info!(path = %path.display(), "loaded native module");
            Ok(init)
        }
    }

    /// Number of libraries opened so far.
    pub fn loaded_count() -> usize {
        LIBRARIES
            .lock()
            .map(|libs| libs.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_loader_reports_load_error() {
        let err = load_with(&DisabledLoader, Path::new("libx.so"), None).unwrap_err();
        match err {
            NativeError::Load { reason, .. } => {
                assert_eq!(reason, "dynamic libraries not supported")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
