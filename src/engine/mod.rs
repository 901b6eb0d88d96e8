// src/engine/mod.rs

//! Supervision engine for procward.
//!
//! One independent state machine per process id:
//! - the pure per-instance state machine lives in [`core`], with the
//!   individual transitions in [`transitions`];
//! - [`actor`] is the async shell around one core: it owns the instance's
//!   mailbox, timers and the runner calls the core asks for;
//! - [`supervisor`] maps ids to actors and implements the bulk operations
//!   and shutdown;
//! - [`notifier`] carries events out to the front end.

use std::time::Duration;

use crate::exec::{ExitReport, LaunchError};

/// Canonical process id type used throughout the engine.
pub type ProcessId = String;

/// Which countdown a pending timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Delayed manual/bulk start (`delaySeconds`).
    Delay,
    /// Restart after an unexpected exit (`guardDelaySeconds`).
    Guard,
}

/// Inputs consumed by the per-instance core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreInput {
    /// Manual or bulk start, with the definition's current `delaySeconds`.
    Start { delay: Duration },
    /// User-initiated stop.
    Stop,
    /// A timer armed by the core elapsed.
    TimerFired { generation: u64 },
    /// Result of a `CoreCommand::Spawn`.
    SpawnSucceeded { pid: u32 },
    SpawnFailed { error: LaunchError },
    /// The watched process terminated. `guard` is the guard delay when the
    /// definition has guard enabled at the time of the exit.
    Exited {
        pid: u32,
        report: ExitReport,
        guard: Option<Duration>,
    },
}

pub mod actor;
pub mod core;
pub mod notifier;
pub mod supervisor;
pub mod transitions;

pub use self::core::{InstanceCore, PendingTimer};
pub use notifier::Notifier;
pub use supervisor::SupervisorEngine;
pub use transitions::{CoreCommand, CoreStep};
