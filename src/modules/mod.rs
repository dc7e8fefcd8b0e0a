//! Capability modules and the ordered registry that composes them.
//!
//! The manifest order is part of the startup contract: modules are composed
//! strictly in [`MANIFEST`] order, and a module may read whatever earlier
//! modules registered in [`Capabilities`].  The registry rejects any module
//! set that does not match the manifest exactly.

pub mod blueprint;
pub mod df;
pub mod filepicker;
pub mod hotkeys;
pub mod init;
pub mod log;
pub mod opaque;
pub mod qfconvert;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::AppConfig;
use crate::runtime::Runtime;

use self::qfconvert::keys::KeyBindings;
use self::qfconvert::ConvertError;

/// Module names in composition order.
pub const MANIFEST: &[&str] = &[
    "blueprint",
    "compile",
    "convert",
    "df",
    "filepicker",
    "hotkeys",
    "init",
    "log",
    "misc",
    "mousetip",
    "qfconvert",
    "sheetgui",
    "win32",
];

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("the init entry point has not run")]
    InitNotRun,
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

// ───────────────────────────────────────── capabilities ──────

/// One composed module, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub module: &'static str,
    pub detail: String,
}

/// Everything the composed modules made available, in composition order.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub entries: Vec<Capability>,
    pub blueprint_dir: Option<PathBuf>,
    pub blueprint_files: Vec<PathBuf>,
    pub interface_txt: Option<PathBuf>,
    pub key_bindings: KeyBindings,
}

impl Capabilities {
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|c| c.module).collect()
    }

    pub fn get(&self, module: &str) -> Option<&Capability> {
        self.entries.iter().find(|c| c.module == module)
    }
}

/// Inputs available to a module while it is being composed.
pub struct Composition<'a> {
    pub runtime: &'a Runtime,
    pub config: &'a AppConfig,
    /// Whether the init entry point completed before composition started.
    pub init_done: bool,
    pub capabilities: Capabilities,
}

impl<'a> Composition<'a> {
    pub fn new(runtime: &'a Runtime, config: &'a AppConfig, init_done: bool) -> Self {
        Self {
            runtime,
            config,
            init_done,
            capabilities: Capabilities::default(),
        }
    }
}

// ───────────────────────────────────────── module trait ──────

/// A named unit of functionality made available at startup.
pub trait Module {
    fn name(&self) -> &'static str;

    /// Make this module available.  Returns the human-readable detail
    /// recorded alongside its name.
    fn compose(&self, ctx: &mut Composition<'_>) -> Result<String, ModuleError>;
}

/// Manifest mismatch found while building a [`ModuleRegistry`].
#[derive(Debug, Error)]
#[error("module set {found:?} does not match manifest {expected:?}")]
pub struct ManifestMismatch {
    pub expected: Vec<&'static str>,
    pub found: Vec<&'static str>,
}

/// Ordered set of modules, checked against [`MANIFEST`].
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ModuleRegistry {
    pub fn new(modules: Vec<Box<dyn Module>>) -> Result<Self, ManifestMismatch> {
        let found: Vec<&'static str> = modules.iter().map(|m| m.name()).collect();
        if found != MANIFEST {
            return Err(ManifestMismatch {
                expected: MANIFEST.to_vec(),
                found,
            });
        }
        Ok(Self { modules })
    }

    /// The standard module set, validated like any other.
    pub fn standard() -> Result<Self, ManifestMismatch> {
        let modules: Vec<Box<dyn Module>> = vec![
            Box::new(blueprint::Blueprint),
            Box::new(opaque::Opaque::new("compile")),
            Box::new(opaque::Opaque::new("convert")),
            Box::new(df::DwarfFortress),
            Box::new(filepicker::FilePicker),
            Box::new(hotkeys::Hotkeys),
            Box::new(init::InitModule),
            Box::new(log::LogModule),
            Box::new(opaque::Opaque::new("misc")),
            Box::new(opaque::Opaque::new("mousetip")),
            Box::new(qfconvert::QfConvert),
            Box::new(opaque::Opaque::new("sheetgui")),
            Box::new(opaque::Opaque::new("win32")),
        ];
        Self::new(modules)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Compose every module in order.  `on_composed` is called after each
    /// module succeeds; the first failure stops composition.
    pub fn compose_all(
        &self,
        ctx: &mut Composition<'_>,
        mut on_composed: impl FnMut(&'static str),
    ) -> Result<(), (&'static str, ModuleError)> {
        for module in &self.modules {
            let name = module.name();
            let detail = module.compose(ctx).map_err(|e| (name, e))?;
            tracing::debug!("composed {name}: {detail}");
            ctx.capabilities.entries.push(Capability {
                module: name,
                detail,
            });
            on_composed(name);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bootstrap::env::{EnvMode, Variables};

    pub(crate) fn test_runtime() -> Runtime {
        Runtime {
            version: crate::runtime::VERSION,
            pid: 1,
            lock_path: PathBuf::from("/tmp/qf-test.lock"),
            started_at: chrono::Local::now(),
            log_filter: "warn".into(),
            variables: Variables::new(EnvMode::Strict),
        }
    }

    #[test]
    fn standard_registry_matches_manifest() {
        let reg = ModuleRegistry::standard().unwrap();
        assert_eq!(reg.names(), MANIFEST);
        assert_eq!(MANIFEST.len(), 13);
    }

    #[test]
    fn reordered_or_partial_sets_are_rejected() {
        let mut names: Vec<&'static str> = MANIFEST.to_vec();
        names.swap(0, 1);
        let modules: Vec<Box<dyn Module>> = names
            .iter()
            .map(|n| Box::new(opaque::Opaque::new(*n)) as Box<dyn Module>)
            .collect();
        let err = ModuleRegistry::new(modules).unwrap_err();
        assert_eq!(err.found[0], "compile");

        let partial: Vec<Box<dyn Module>> = MANIFEST[..12]
            .iter()
            .map(|n| Box::new(opaque::Opaque::new(*n)) as Box<dyn Module>)
            .collect();
        assert!(ModuleRegistry::new(partial).is_err());
    }

    #[test]
    fn compose_all_runs_in_manifest_order() {
        let runtime = test_runtime();
        let config = AppConfig::default();
        let mut ctx = Composition::new(&runtime, &config, true);
        let mut seen = Vec::new();

        ModuleRegistry::standard()
            .unwrap()
            .compose_all(&mut ctx, |name| seen.push(name))
            .unwrap();

        assert_eq!(seen, MANIFEST);
        assert_eq!(ctx.capabilities.names(), MANIFEST);
        assert!(ctx.capabilities.get("qfconvert").is_some());
    }

    #[test]
    fn composition_stops_at_first_failure() {
        let runtime = test_runtime();
        let config = AppConfig::default();
        // init refuses to compose before the entry point has run.
        let mut ctx = Composition::new(&runtime, &config, false);
        let mut seen = Vec::new();

        let (name, err) = ModuleRegistry::standard()
            .unwrap()
            .compose_all(&mut ctx, |name| seen.push(name))
            .unwrap_err();

        assert_eq!(name, "init");
        assert!(matches!(err, ModuleError::InitNotRun));
        assert_eq!(seen, &MANIFEST[..6]);
    }
}
