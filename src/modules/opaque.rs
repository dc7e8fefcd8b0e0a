//! Modules that only announce themselves.
//!
//! `compile`, `convert`, `misc`, `mousetip`, `sheetgui` and `win32` take
//! part in composition so the manifest stays complete, but carry no
//! behaviour of their own.

use super::{Composition, Module, ModuleError};

#[derive(Debug, Clone, Copy)]
pub struct Opaque {
    name: &'static str,
}

impl Opaque {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Module for Opaque {
    fn name(&self) -> &'static str {
        self.name
    }

    fn compose(&self, _ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        Ok("available".into())
    }
}
