//! Hotkey table.

use crate::config::Action;

use super::{Composition, Module, ModuleError};

#[derive(Debug, Clone, Copy)]
pub struct Hotkeys;

impl Module for Hotkeys {
    fn name(&self) -> &'static str {
        "hotkeys"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        let summary = Action::ALL
            .iter()
            .map(|&a| format!("{}: {}", a.label(), ctx.config.display_bindings(a)))
            .collect::<Vec<_>>()
            .join(" | ");
        Ok(summary)
    }
}
