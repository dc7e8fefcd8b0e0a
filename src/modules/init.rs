//! The application initializer.
//!
//! [`init`] is the single entry point the bootstrapper calls once the
//! version is fixed.  It loads the user configuration.  The module's own
//! composition step only confirms that [`init`] already ran.

use std::path::Path;

use crate::bootstrap::BootError;
use crate::config::{self, AppConfig};
use crate::runtime::{self, Runtime};

use super::{Composition, Module, ModuleError};

/// Remaining startup work after the version is set.
///
/// An explicit `config_path` must exist; the default location falls back
/// to built-in settings when absent.
pub fn init(runtime: &Runtime, config_path: Option<&Path>) -> Result<AppConfig, BootError> {
    if runtime::version() != Some(runtime.version) {
        return Err(BootError::VersionNotSet);
    }

    let config = match config_path {
        Some(path) => AppConfig::load_required(path, &runtime.variables).map_err(|source| {
            BootError::Config {
                path: path.to_path_buf(),
                source,
            }
        })?,
        None => AppConfig::load(&config::config_path(&runtime.variables), &runtime.variables),
    };

    tracing::info!(
        "quickfort {} initialised (pid {}, {} env)",
        runtime.version,
        runtime.pid,
        runtime.env_mode().label()
    );
    Ok(config)
}

#[derive(Debug, Clone, Copy)]
pub struct InitModule;

impl Module for InitModule {
    fn name(&self) -> &'static str {
        "init"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        if !ctx.init_done {
            return Err(ModuleError::InitNotRun);
        }
        Ok(format!("started {}", ctx.runtime.started_at.format("%Y-%m-%d %H:%M:%S")))
    }
}
