//! Blueprint location.

use super::{Composition, Module, ModuleError};

#[derive(Debug, Clone, Copy)]
pub struct Blueprint;

impl Module for Blueprint {
    fn name(&self) -> &'static str {
        "blueprint"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        let Some(dir) = ctx.config.blueprint_dir.clone() else {
            return Ok("no blueprint directory configured".into());
        };
        if !dir.is_dir() {
            tracing::warn!("blueprint directory {} does not exist", dir.display());
        }
        let detail = format!("blueprints in {}", dir.display());
        ctx.capabilities.blueprint_dir = Some(dir);
        Ok(detail)
    }
}
