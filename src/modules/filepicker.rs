//! Blueprint file discovery.
//!
//! Walks the blueprint directory registered by `blueprint` and collects the
//! spreadsheet files a user can pick from, sorted by path.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Composition, Module, ModuleError};

/// Extensions recognised as blueprints (lower-case).
const BLUEPRINT_EXTENSIONS: &[&str] = &["csv", "xls", "xlsx"];

/// How deep below the blueprint directory to look.
const MAX_DEPTH: usize = 4;

/// Collect blueprint files under `dir`.  Unreadable entries are skipped.
pub fn list_blueprints(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(MAX_DEPTH)
        .follow_links(true)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_blueprint(path))
        .collect();
    files.sort();
    files
}

fn is_blueprint(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| BLUEPRINT_EXTENSIONS.contains(&e.as_str()))
}

#[derive(Debug, Clone, Copy)]
pub struct FilePicker;

impl Module for FilePicker {
    fn name(&self) -> &'static str {
        "filepicker"
    }

    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError> {
        let Some(dir) = ctx.capabilities.blueprint_dir.as_deref() else {
            return Ok("nothing to pick from".into());
        };
        let files = list_blueprints(dir);
        let detail = format!("{} blueprint file(s)", files.len());
        ctx.capabilities.blueprint_files = files;
        Ok(detail)
    }
}
