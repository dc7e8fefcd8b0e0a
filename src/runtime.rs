//! Process-wide runtime facts, fixed at startup.
//!
//! The version string lives in a write-once cell so any code can read it
//! without threading it through every call.  Everything else the bootstrapper
//! learns about the process goes into [`Runtime`], which is built once and
//! handed out by reference.

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, Local};

use crate::bootstrap::env::{EnvMode, Variables};
use crate::bootstrap::BootError;

/// Version of this build.
pub const VERSION: &str = "2.00pre2";

static VERSION_CELL: OnceLock<&'static str> = OnceLock::new();

/// Fix the process-wide version.  Setting the same value twice is a no-op;
/// setting a different one is an error.
pub fn set_version(value: &'static str) -> Result<(), BootError> {
    let current = *VERSION_CELL.get_or_init(|| value);
    if current == value {
        Ok(())
    } else {
        Err(BootError::VersionConflict {
            current: current.to_string(),
            requested: value.to_string(),
        })
    }
}

/// The process-wide version, once the bootstrapper has set it.
pub fn version() -> Option<&'static str> {
    VERSION_CELL.get().copied()
}

/// Immutable startup context shared by every module.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub version: &'static str,
    pub pid: u32,
    pub lock_path: PathBuf,
    pub started_at: DateTime<Local>,
    /// Log filter directive the subscriber was installed with.
    pub log_filter: String,
    pub variables: Variables,
}

impl Runtime {
    pub fn env_mode(&self) -> EnvMode {
        self.variables.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_write_once() {
        set_version(VERSION).unwrap();
        set_version(VERSION).unwrap();
        assert_eq!(version(), Some("2.00pre2"));

        let err = set_version("1.11").unwrap_err();
        assert!(matches!(err, BootError::VersionConflict { .. }));
        assert_eq!(version(), Some(VERSION));
    }
}
