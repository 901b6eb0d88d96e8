// src/engine/core.rs

//! Pure per-instance state machine.
//!
//! [`InstanceCore`] consumes [`CoreInput`]s and produces:
//! - an updated instance state
//! - a list of [`CoreCommand`]s describing what the actor should do next
//!
//! It has no channels, no Tokio types and performs no IO, so every
//! transition can be unit tested deterministically.

use crate::engine::transitions::{
    handle_exited, handle_spawn_failed, handle_spawn_succeeded, handle_start, handle_stop,
    handle_timer_fired, CoreStep,
};
use crate::engine::{CoreInput, ProcessId, TimerKind};
use crate::types::ProcessStatus;

/// The one timer an instance may have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Runtime state of one supervised definition.
#[derive(Debug, Clone)]
pub struct InstanceCore {
    pub(crate) id: ProcessId,
    pub(crate) status: ProcessStatus,
    pub(crate) pid: u32,
    pub(crate) stop_requested: bool,
    pub(crate) timer: Option<PendingTimer>,
    pub(crate) next_generation: u64,
}

impl InstanceCore {
    pub fn new(id: impl Into<ProcessId>) -> Self {
        Self {
            id: id.into(),
            status: ProcessStatus::Stopped,
            pid: 0,
            stop_requested: false,
            timer: None,
            next_generation: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Live pid, 0 unless Running.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn pending_timer(&self) -> Option<PendingTimer> {
        self.timer
    }

    /// Handle a single input, updating the state and returning the resulting
    /// commands for the actor.
    pub fn step(&mut self, input: CoreInput) -> CoreStep {
        match input {
            CoreInput::Start { delay } => handle_start(self, delay),
            CoreInput::Stop => handle_stop(self),
            CoreInput::TimerFired { generation } => handle_timer_fired(self, generation),
            CoreInput::SpawnSucceeded { pid } => handle_spawn_succeeded(self, pid),
            CoreInput::SpawnFailed { error } => handle_spawn_failed(self, &error),
            CoreInput::Exited { pid, report, guard } => handle_exited(self, pid, report, guard),
        }
    }
}
