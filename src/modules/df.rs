//! Dwarf Fortress install lookup.
//!
//! The only thing taken from the install is `data/init/interface.txt`,
//! which holds DF's key bindings for macro output.

use std::path::{Path, PathBuf};

use super::{Composition, Module, ModuleError};

#[derive(Debug, Clone, Copy)]
pub struct DwarfFortress;

/// Location of `interface.txt` relative to a DF install.
pub fn interface_txt_path(df_dir: &Path) -> PathBuf {
    df_dir.join("data").join("init").join("interface.txt")
}

impl Module for DwarfFortress {
    fn name(&self) -> &'static str {
        "df"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        let Some(df_dir) = ctx.config.df_dir.as_deref() else {
            return Ok("no Dwarf Fortress directory configured".into());
        };

        let interface = interface_txt_path(df_dir);
        if interface.is_file() {
            let detail = format!("key bindings from {}", interface.display());
            ctx.capabilities.interface_txt = Some(interface);
            Ok(detail)
        } else {
            tracing::warn!("{} not found; macro output disabled", interface.display());
            Ok(format!("{} (no interface.txt)", df_dir.display()))
        }
    }
}
