//! Keycode conversion — from QuickFort keycodes to keystrokes or DF macros.

pub mod geometry;
pub mod keys;
pub mod keystroker;

use std::path::PathBuf;

use thiserror::Error;

use self::keys::KeyBindings;
use super::{Composition, Module, ModuleError};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("key '{0}' not bound in interface.txt")]
    Unbound(String),
    #[error("no plotted cell at ({x}, {y})")]
    NoCell { x: i32, y: i32 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct QfConvert;

impl Module for QfConvert {
    fn name(&self) -> &'static str {
        "qfconvert"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        let Some(path) = ctx.capabilities.interface_txt.as_deref() else {
            return Ok("keystroke output only".into());
        };
        let bindings = KeyBindings::load(path)?;
        let detail = format!("keystroke + macro output ({} bound keys)", bindings.len());
        ctx.capabilities.key_bindings = bindings;
        Ok(detail)
    }
}
