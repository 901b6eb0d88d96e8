use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// How a definition's path is launched.
///
/// - `Exe`: the path is executed directly.
/// - `Bat`: the path is a script handed to the platform shell
///   (`cmd.exe /c` on Windows, `sh` elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Exe,
    Bat,
}

impl ProcessKind {
    /// Infer the kind from the file extension: `.bat` / `.cmd` are scripts,
    /// everything else is an executable.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("bat") | Some("cmd") => ProcessKind::Bat,
            _ => ProcessKind::Exe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessKind::Exe => "exe",
            ProcessKind::Bat => "bat",
        }
    }
}

/// Runtime status of a supervised instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Stopped,
    Starting,
    Running,
    Restarting,
    Failed,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Restarting => "restarting",
            ProcessStatus::Failed => "failed",
        }
    }

    /// Stopped or Failed: nothing live, no timer pending. Only idle
    /// instances may be started or deleted.
    pub fn is_idle(self) -> bool {
        matches!(self, ProcessStatus::Stopped | ProcessStatus::Failed)
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        ProcessStatus::Stopped
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to live children when the supervisor itself exits.
///
/// - `StopAll`: every live process is stopped (graceful, then forced).
/// - `DetachBackground`: foreground processes are stopped, `background`
///   ones are left running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    StopAll,
    DetachBackground,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::StopAll
    }
}

