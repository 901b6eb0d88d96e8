// src/exec/runner.rs

//! Pluggable runner abstraction.
//!
//! The engine talks to a `ProcessRunner` instead of `tokio::process`
//! directly. This keeps the supervision state machine testable with a fake
//! runner that never starts a real process.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

use crate::config::ProcessDefinition;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why a spawn attempt did not produce a live process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("launch failed: {0}")]
    LaunchFailed(String),
}

/// How a process terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal (Unix only).
    pub signal: Option<i32>,
}

impl ExitReport {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Spawns, watches and kills OS processes on behalf of the engine.
///
/// Implementations hold only transient per-pid handles.
pub trait ProcessRunner: Send + Sync + 'static {
    /// Launch the process described by `def` and return its pid.
    fn spawn(&self, def: &ProcessDefinition) -> Result<u32, LaunchError>;

    /// Resolve once `pid` has terminated for any reason.
    ///
    /// An unknown pid resolves immediately with an empty report.
    fn watch(&self, pid: u32) -> BoxFuture<'static, ExitReport>;

    /// Terminate `pid`: graceful first, forced after the grace period.
    ///
    /// Resolves once the process is gone. Killing an exited or unknown pid
    /// is a successful no-op.
    fn kill(&self, pid: u32) -> BoxFuture<'static, ()>;

    /// Forget `pid` without terminating it, so it outlives the supervisor.
    fn detach(&self, _pid: u32) {}
}
