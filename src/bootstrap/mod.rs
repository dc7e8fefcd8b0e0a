//! Startup sequence.
//!
//! The bootstrapper moves the process from `Uninitialized` to `Running`
//! exactly once, in a fixed order:
//!
//! 1. enforce the single-instance guarantee
//! 2. disable legacy environment lookups
//! 3. fix the process-wide version
//! 4. call the init entry point
//! 5. compose the module manifest
//!
//! Every step must succeed; the first failure aborts startup.

pub mod env;
pub mod instance;

use std::path::PathBuf;

use chrono::Local;
use thiserror::Error;

use crate::config::AppConfig;
use crate::modules::{self, Capabilities, Composition, ManifestMismatch, ModuleError, ModuleRegistry};
use crate::runtime::{self, Runtime, VERSION};

use self::env::{EnvMode, Variables};
use self::instance::{InstanceError, InstanceGuard, ProcessControl};

/// Process environment carried into strict mode, each with its fallback
/// sources.  Nothing else is visible once legacy lookups are off.
const IMPORTED_VARS: &[(&str, &[&str])] = &[
    ("HOME", &["HOME", "USERPROFILE"]),
    ("XDG_CONFIG_HOME", &["XDG_CONFIG_HOME"]),
    ("USER", &["USER", "USERNAME"]),
];

#[derive(Debug, Error)]
pub enum BootError {
    #[error("bootstrap already ran in this process")]
    AlreadyRunning,
    #[error("single-instance check failed: {0}")]
    Instance(#[from] InstanceError),
    #[error("version already set to {current}, refusing {requested}")]
    VersionConflict { current: String, requested: String },
    #[error("init called before the version was set")]
    VersionNotSet,
    #[error("failed to load config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Manifest(#[from] ManifestMismatch),
    #[error("module `{name}` failed to compose: {source}")]
    Module {
        name: &'static str,
        #[source]
        source: ModuleError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Uninitialized,
    Running,
}

/// One completed startup step, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootStep {
    EnforceSingleInstance,
    DisableLegacyEnv,
    SetVersion,
    Init,
    Compose(&'static str),
}

/// Inputs to a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootOptions {
    pub pid: u32,
    pub lock_path: PathBuf,
    /// Explicit config file; `None` uses the default location.
    pub config_path: Option<PathBuf>,
    pub log_filter: String,
}

/// A successfully started process.  Dropping it releases the instance lock.
#[derive(Debug)]
pub struct Session {
    pub runtime: Runtime,
    pub config: AppConfig,
    pub capabilities: Capabilities,
    guard: InstanceGuard,
}

impl Session {
    /// Pid of the instance this launch replaced, if any.
    pub fn replaced_instance(&self) -> Option<u32> {
        self.guard.replaced()
    }
}

pub struct Bootstrapper<P> {
    state: BootState,
    steps: Vec<BootStep>,
    options: BootOptions,
    processes: P,
}

impl<P: ProcessControl> Bootstrapper<P> {
    pub fn new(options: BootOptions, processes: P) -> Self {
        Self {
            state: BootState::Uninitialized,
            steps: Vec::new(),
            options,
            processes,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// Steps completed so far, in order.
    pub fn steps(&self) -> &[BootStep] {
        &self.steps
    }

    /// Run the full startup sequence.
    pub fn run(&mut self) -> Result<Session, BootError> {
        if self.state == BootState::Running {
            return Err(BootError::AlreadyRunning);
        }
        // A failed attempt leaves its partial log behind; start over.
        self.steps.clear();

        // ── 1. single instance ─────────────────────────────────────
        let guard = InstanceGuard::acquire(&self.options.lock_path, self.options.pid, &self.processes)?;
        self.steps.push(BootStep::EnforceSingleInstance);
        tracing::info!("instance lock held at {}", guard.path().display());

        // ── 2. strict environment ──────────────────────────────────
        let mut variables = Variables::new(EnvMode::Legacy);
        variables.disable_legacy_env();
        // Explicit reads only from here on.
        for &(name, sources) in IMPORTED_VARS {
            if let Some(value) = sources.iter().find_map(|src| std::env::var(src).ok()) {
                variables.define(name, value);
            }
        }
        self.steps.push(BootStep::DisableLegacyEnv);

        // ── 3. version ─────────────────────────────────────────────
        runtime::set_version(VERSION)?;
        variables.define("QF_VERSION", VERSION);
        self.steps.push(BootStep::SetVersion);

        let runtime = Runtime {
            version: VERSION,
            pid: self.options.pid,
            lock_path: guard.path().to_path_buf(),
            started_at: Local::now(),
            log_filter: self.options.log_filter.clone(),
            variables,
        };

        // ── 4. init ────────────────────────────────────────────────
        let config = modules::init::init(&runtime, self.options.config_path.as_deref())?;
        self.steps.push(BootStep::Init);

        // ── 5. compose ─────────────────────────────────────────────
        let registry = ModuleRegistry::standard()?;
        let mut ctx = Composition::new(&runtime, &config, true);
        let steps = &mut self.steps;
        registry
            .compose_all(&mut ctx, |name| steps.push(BootStep::Compose(name)))
            .map_err(|(name, source)| BootError::Module { name, source })?;
        let capabilities = ctx.capabilities;

        self.state = BootState::Running;
        tracing::info!("{} modules composed", capabilities.entries.len());

        Ok(Session {
            runtime,
            config,
            capabilities,
            guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::instance::tests::FakeProcesses;
    use super::*;
    use crate::modules::MANIFEST;

    fn options(dir: &std::path::Path, pid: u32) -> BootOptions {
        let config_path = dir.join("config.toml");
        if !config_path.exists() {
            std::fs::write(&config_path, "jump_moves = true\n").unwrap();
        }
        BootOptions {
            pid,
            lock_path: dir.join("qf.lock"),
            config_path: Some(config_path),
            log_filter: "warn".into(),
        }
    }

    #[test]
    fn startup_runs_steps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut boot = Bootstrapper::new(options(dir.path(), 100), FakeProcesses::default());
        assert_eq!(boot.state(), BootState::Uninitialized);

        let session = boot.run().unwrap();
        assert_eq!(boot.state(), BootState::Running);

        let mut expected = vec![
            BootStep::EnforceSingleInstance,
            BootStep::DisableLegacyEnv,
            BootStep::SetVersion,
            BootStep::Init,
        ];
        expected.extend(MANIFEST.iter().map(|&m| BootStep::Compose(m)));
        assert_eq!(boot.steps(), expected.as_slice());

        assert_eq!(runtime::version(), Some("2.00pre2"));
        assert_eq!(session.runtime.version, "2.00pre2");
        assert_eq!(session.runtime.env_mode(), EnvMode::Strict);
        assert_eq!(session.capabilities.names(), MANIFEST);
        assert_eq!(
            boot.steps().iter().filter(|s| **s == BootStep::Init).count(),
            1
        );
    }

    #[test]
    fn second_run_in_same_process_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut boot = Bootstrapper::new(options(dir.path(), 100), FakeProcesses::default());
        let _session = boot.run().unwrap();
        let steps_before = boot.steps().len();

        assert!(matches!(boot.run(), Err(BootError::AlreadyRunning)));
        assert_eq!(boot.steps().len(), steps_before);
    }

    #[test]
    fn relaunch_replaces_previous_instance() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::with_alive(&[100, 200]);

        let mut first = Bootstrapper::new(options(dir.path(), 100), &procs);
        let first_session = first.run().unwrap();
        assert_eq!(first_session.replaced_instance(), None);

        let mut second = Bootstrapper::new(options(dir.path(), 200), &procs);
        let second_session = second.run().unwrap();
        assert_eq!(second_session.replaced_instance(), Some(100));
        assert_eq!(*procs.terminated.borrow(), vec![100]);
        assert!(!procs.is_alive(100));

        let lock = std::fs::read_to_string(dir.path().join("qf.lock")).unwrap();
        assert_eq!(lock.lines().next(), Some("200"));
    }

    #[test]
    fn missing_explicit_config_aborts_after_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), 100);
        opts.config_path = Some(dir.path().join("absent.toml"));

        let mut boot = Bootstrapper::new(opts, FakeProcesses::default());
        assert!(matches!(boot.run(), Err(BootError::Config { .. })));
        assert_eq!(boot.state(), BootState::Uninitialized);
        assert_eq!(
            boot.steps(),
            &[
                BootStep::EnforceSingleInstance,
                BootStep::DisableLegacyEnv,
                BootStep::SetVersion
            ]
        );
    }

    #[test]
    fn retry_after_failure_logs_one_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path(), 100);
        let config_path = dir.path().join("late.toml");
        opts.config_path = Some(config_path.clone());

        let mut boot = Bootstrapper::new(opts, FakeProcesses::default());
        assert!(boot.run().is_err());
        assert_eq!(boot.steps().len(), 3);

        std::fs::write(&config_path, "jump_moves = false\n").unwrap();
        let session = boot.run().unwrap();
        assert!(!session.config.jump_moves);
        assert_eq!(boot.steps()[0], BootStep::EnforceSingleInstance);
        assert_eq!(
            boot.steps()
                .iter()
                .filter(|s| **s == BootStep::EnforceSingleInstance)
                .count(),
            1
        );
        assert_eq!(boot.steps().len(), 4 + MANIFEST.len());
    }

    #[test]
    fn strict_runtime_sees_only_imported_variables() {
        let dir = tempfile::tempdir().unwrap();
        let mut boot = Bootstrapper::new(options(dir.path(), 100), FakeProcesses::default());
        let session = boot.run().unwrap();
        let vars = &session.runtime.variables;

        let expected_user = std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok();
        assert_eq!(vars.get("USER"), expected_user);
        assert_eq!(vars.get("XDG_CONFIG_HOME"), std::env::var("XDG_CONFIG_HOME").ok());
        assert_eq!(vars.get("QF_VERSION").as_deref(), Some("2.00pre2"));
        // PATH is never imported.
        assert_eq!(vars.get("PATH"), None);
    }
}
