//! Single-instance enforcement.
//!
//! One lock file per user session records the pid of the running instance.
//! The policy is "force": a new launch terminates the previous instance and
//! takes the lock over.  Stale locks (dead pid, garbage contents) are simply
//! replaced.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use sysinfo::{Pid, Signal, System};
use thiserror::Error;

use super::env::Variables;

/// How long to wait for a terminated instance to exit.
const EXIT_POLL_ATTEMPTS: u32 = 20;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Lock creation retries when another launcher races us.
const CREATE_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to access instance lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("previous instance (pid {0}) did not exit after being terminated")]
    StillRunning(u32),
    #[error("instance lock {0} is contended by concurrent launches")]
    Contended(PathBuf),
}

// ───────────────────────────────────────── process control ───

/// Liveness checks and termination of other processes.
pub trait ProcessControl {
    fn is_alive(&self, pid: u32) -> bool;
    /// Ask `pid` to exit.  Returns `false` when the signal could not be sent.
    fn terminate(&self, pid: u32) -> bool;
}

impl<T: ProcessControl + ?Sized> ProcessControl for &T {
    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }

    fn terminate(&self, pid: u32) -> bool {
        (**self).terminate(pid)
    }
}

/// [`ProcessControl`] backed by the operating system via `sysinfo`.
#[derive(Debug, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        let mut sys = System::new();
        sys.refresh_process(Pid::from_u32(pid))
    }

    fn terminate(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        let mut sys = System::new();
        if !sys.refresh_process(pid) {
            return true; // already gone
        }
        match sys.process(pid) {
            // Prefer a polite SIGTERM; fall back to a hard kill where
            // the platform has no such signal.
            Some(p) => p.kill_with(Signal::Term).unwrap_or_else(|| p.kill()),
            None => true,
        }
    }
}

// ───────────────────────────────────────── lock guard ────────

/// Held for the lifetime of the running instance.  Dropping it releases the
/// lock file, unless another instance has taken it over in the meantime.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    pid: u32,
    /// Pid of the instance this launch replaced, if any.
    replaced: Option<u32>,
}

impl InstanceGuard {
    /// Acquire the lock at `path` for `pid`, terminating any live holder.
    pub fn acquire(
        path: &Path,
        pid: u32,
        processes: &dyn ProcessControl,
    ) -> Result<Self, InstanceError> {
        let mut replaced = None;

        for _ in 0..CREATE_ATTEMPTS {
            if let Some(seen) = read_lock(path)? {
                match parse_pid(&seen) {
                    Some(holder) if holder != pid && processes.is_alive(holder) => {
                        tracing::info!("replacing running instance (pid {holder})");
                        if !processes.terminate(holder) {
                            tracing::warn!("could not signal pid {holder}");
                        }
                        wait_for_exit(holder, processes)?;
                        replaced = Some(holder);
                    }
                    Some(holder) if holder != pid => {
                        tracing::debug!("removing stale instance lock (pid {holder})");
                    }
                    Some(_) => {}
                    None => tracing::debug!("removing unreadable instance lock"),
                }

                // Another launcher may have rewritten the lock meanwhile;
                // only the lock we inspected may be removed.
                if read_lock(path)?.as_deref() != Some(seen.as_str()) {
                    continue;
                }
                remove_if_exists(path)?;
            }

            match write_lock(path, pid) {
                Ok(()) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                        pid,
                        replaced,
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(InstanceError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        Err(InstanceError::Contended(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn replaced(&self) -> Option<u32> {
        self.replaced
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Only remove the file if it still names us.
        if let Ok(Some(holder)) = read_lock_pid(&self.path) {
            if holder == self.pid {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}

/// Default lock location: one file per user in the temp directory.
///
/// Resolved before the bootstrap switches to strict mode, so `vars` is
/// expected to still be in legacy mode.
pub fn default_lock_path(vars: &Variables) -> PathBuf {
    let user = vars
        .get("USER")
        .or_else(|| vars.get("USERNAME"))
        .unwrap_or_else(|| "default".into());
    std::env::temp_dir().join(format!("{}-{user}.lock", env!("CARGO_PKG_NAME")))
}

// ───────────────────────────────────────── helpers ───────────

/// Raw lock contents; `None` when there is no lock.
fn read_lock(path: &Path) -> Result<Option<String>, InstanceError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(InstanceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Lock file format: pid on the first line, start timestamp on the second.
fn parse_pid(contents: &str) -> Option<u32> {
    contents.lines().next().and_then(|line| line.trim().parse().ok())
}

fn read_lock_pid(path: &Path) -> Result<Option<u32>, InstanceError> {
    Ok(read_lock(path)?.as_deref().and_then(parse_pid))
}

fn write_lock(path: &Path, pid: u32) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{pid}")?;
    writeln!(file, "{}", Local::now().to_rfc3339())?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), InstanceError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(InstanceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn wait_for_exit(pid: u32, processes: &dyn ProcessControl) -> Result<(), InstanceError> {
    for _ in 0..EXIT_POLL_ATTEMPTS {
        if !processes.is_alive(pid) {
            return Ok(());
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
    Err(InstanceError::StillRunning(pid))
}
