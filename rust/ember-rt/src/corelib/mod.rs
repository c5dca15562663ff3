//! The root environment every program starts from.
//!
//! Construction order matters: later registrations shadow earlier ones, and
//! the libraries expect the native primitives and assembled routines to be
//! bound already when they populate.

pub mod assemble;
pub mod bootstrap;
pub mod cfuns;
pub mod native;
pub mod templates;

use crate::env::Env;
use crate::libs;
use crate::marshal::{self, MarshalError};
use crate::reader::ParseError;
use crate::value::Value;
use crate::vm::{Vm, VmError};
use bootstrap::{Bootstrap, DefaultBootstrap, SourceBootstrap};
use ember_core::VerifyError;
use thiserror::Error;

/// Startup failures. None of these are recoverable: a runtime without its
/// core environment cannot run anything.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("assembling {name}: {source}")]
    Assemble {
        name: String,
        #[source]
        source: VerifyError,
    },
    #[error("boot source: {0}")]
    Parse(#[from] ParseError),
    #[error("boot source: {source}")]
    Eval {
        #[source]
        source: VmError,
    },
    #[error("core image: {0}")]
    Image(#[from] MarshalError),
}

/// Build identifier baked in at compile time.
pub fn build_id() -> &'static str {
    option_env!("EMBER_BUILD").unwrap_or("local")
}

/// Builds the environment up to, but not including, the bootstrap step:
/// native primitives, assembled routines, version bindings, rooting, and
/// every library. `replacements` is filled in place when given.
pub fn native_env(vm: &mut Vm, replacements: Option<Env>) -> Result<Env, BootError> {
    let env = replacements.unwrap_or_default();

    cfuns::register(&env);
    templates::register(&env)?;

    env.def(
        "ember/version",
        Value::string(env!("CARGO_PKG_VERSION")),
        Some("The version number of the running ember runtime."),
    );
    env.def(
        "ember/build",
        Value::string(build_id()),
        Some("A unique identifier for the build of ember."),
    );
    env.def(
        "_env",
        env.to_value(),
        Some("The environment table for the current scope."),
    );

    vm.gc_root(env.to_value());
    vm.set_root_env(env.clone());

    libs::populate_all(vm, &env);

    tracing::debug!(bindings = env.len(), "native environment ready");
    Ok(env)
}

/// Builds the full core environment with the bootstrap selected at build
/// time.
pub fn try_core_env(vm: &mut Vm, replacements: Option<Env>) -> Result<Env, BootError> {
    let env = native_env(vm, replacements)?;
    let env = DefaultBootstrap::default().finish(vm, env)?;
    tracing::info!(bindings = env.len(), "core environment ready");
    Ok(env)
}

/// Like [`try_core_env`], but a failure aborts the process.
pub fn core_env(vm: &mut Vm, replacements: Option<Env>) -> Env {
    match try_core_env(vm, replacements) {
        Ok(env) => env,
        Err(e) => {
            tracing::error!(error = %e, "failed to build core environment");
            eprintln!("ember: failed to build core environment: {}", e);
            std::process::abort();
        }
    }
}

/// Builds the core environment from source and serializes everything the
/// boot source added. Native values are written by name, so the image can
/// only be loaded against a native environment from the same build.
pub fn make_image(vm: &mut Vm) -> Result<Vec<u8>, BootError> {
    let env = native_env(vm, None)?;
    let lookup = marshal::reverse_lookup(&env);
    let env = SourceBootstrap.finish(vm, env)?;
    let image = marshal::marshal(&env.to_value(), &lookup)?;
    tracing::info!(bytes = image.len(), natives = lookup.len(), "core image built");
    Ok(image)
}
