// src/engine/transitions.rs

//! Transition logic for a single instance.
//!
//! Every handler mutates the [`InstanceCore`] and returns the commands the
//! actor must carry out. Each status change yields exactly one
//! `CoreCommand::Emit`; an input that does not apply to the current state
//! yields no commands at all.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::core::{InstanceCore, PendingTimer};
use crate::engine::TimerKind;
use crate::exec::{ExitReport, LaunchError};
use crate::types::ProcessStatus;

/// Command produced by the core, to be executed by the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Publish a status event.
    Emit { status: ProcessStatus, pid: u32 },
    /// Start a countdown that reports back `TimerFired { generation }`.
    ArmTimer {
        kind: TimerKind,
        delay: Duration,
        generation: u64,
    },
    /// Cancel the pending countdown.
    CancelTimer,
    /// Launch the process from its current definition and feed the result
    /// back as `SpawnSucceeded` / `SpawnFailed`.
    Spawn,
    /// Register for the exit of `pid`.
    Watch { pid: u32 },
    /// Terminate `pid`; the exit arrives through the watch.
    Kill { pid: u32 },
}

/// Decision returned by the core after handling a single input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
}

impl CoreStep {
    fn none() -> Self {
        Self::default()
    }
}

fn transition(core: &mut InstanceCore, status: ProcessStatus, commands: &mut Vec<CoreCommand>) {
    if core.status != status {
        info!(id = %core.id, from = %core.status, to = %status, pid = core.pid, "status changed");
    }
    core.status = status;
    commands.push(CoreCommand::Emit {
        status,
        pid: core.pid,
    });
}

fn arm(core: &mut InstanceCore, kind: TimerKind, delay: Duration, commands: &mut Vec<CoreCommand>) {
    let generation = core.next_generation;
    core.next_generation += 1;
    core.timer = Some(PendingTimer { kind, generation });
    commands.push(CoreCommand::ArmTimer {
        kind,
        delay,
        generation,
    });
}

fn cancel_timer(core: &mut InstanceCore, commands: &mut Vec<CoreCommand>) {
    if core.timer.take().is_some() {
        commands.push(CoreCommand::CancelTimer);
    }
}

/// `start` from Stopped/Failed. Always passes through Starting; a non-zero
/// delay arms the delay timer, otherwise the spawn happens right away.
pub fn handle_start(core: &mut InstanceCore, delay: Duration) -> CoreStep {
    if !core.status.is_idle() {
        debug!(id = %core.id, status = %core.status, "start ignored; instance is active");
        return CoreStep::none();
    }

    let mut commands = Vec::new();
    core.stop_requested = false;
    core.pid = 0;
    transition(core, ProcessStatus::Starting, &mut commands);

    if delay.is_zero() {
        commands.push(CoreCommand::Spawn);
    } else {
        info!(id = %core.id, delay_secs = delay.as_secs(), "delayed start scheduled");
        arm(core, TimerKind::Delay, delay, &mut commands);
    }

    CoreStep { commands }
}

/// A timer elapsed. Stale generations (cancelled or superseded timers) are
/// dropped, so a firing can never outlive a stop.
pub fn handle_timer_fired(core: &mut InstanceCore, generation: u64) -> CoreStep {
    let pending = match core.timer {
        Some(pending) if pending.generation == generation => pending,
        _ => {
            debug!(id = %core.id, generation, "stale timer firing ignored");
            return CoreStep::none();
        }
    };
    core.timer = None;

    let mut commands = Vec::new();
    match (pending.kind, core.status) {
        (TimerKind::Delay, ProcessStatus::Starting) => {
            commands.push(CoreCommand::Spawn);
        }
        (TimerKind::Guard, ProcessStatus::Restarting) => {
            info!(id = %core.id, "guard restart");
            transition(core, ProcessStatus::Starting, &mut commands);
            commands.push(CoreCommand::Spawn);
        }
        (kind, status) => {
            debug!(id = %core.id, ?kind, %status, "timer fired in unexpected state; ignored");
        }
    }

    CoreStep { commands }
}

pub fn handle_spawn_succeeded(core: &mut InstanceCore, pid: u32) -> CoreStep {
    let mut commands = Vec::new();
    core.pid = pid;
    core.stop_requested = false;
    transition(core, ProcessStatus::Running, &mut commands);
    commands.push(CoreCommand::Watch { pid });
    CoreStep { commands }
}

/// Launch failures are terminal until the next explicit start.
pub fn handle_spawn_failed(core: &mut InstanceCore, error: &LaunchError) -> CoreStep {
    warn!(id = %core.id, error = %error, "launch failed");
    let mut commands = Vec::new();
    core.pid = 0;
    transition(core, ProcessStatus::Failed, &mut commands);
    CoreStep { commands }
}

/// User-initiated stop.
///
/// - Starting/Restarting: the pending timer is cancelled and the instance is
///   Stopped immediately.
/// - Running: the process is killed; the instance stays Running until the
///   exit arrives, which then lands in Stopped regardless of guard.
pub fn handle_stop(core: &mut InstanceCore) -> CoreStep {
    let mut commands = Vec::new();

    match core.status {
        ProcessStatus::Starting | ProcessStatus::Restarting => {
            core.stop_requested = true;
            cancel_timer(core, &mut commands);
            core.pid = 0;
            transition(core, ProcessStatus::Stopped, &mut commands);
        }
        ProcessStatus::Running => {
            core.stop_requested = true;
            cancel_timer(core, &mut commands);
            info!(id = %core.id, pid = core.pid, "stop requested; killing process");
            commands.push(CoreCommand::Kill { pid: core.pid });
        }
        ProcessStatus::Stopped | ProcessStatus::Failed => {
            debug!(id = %core.id, status = %core.status, "stop ignored; nothing is running");
        }
    }

    CoreStep { commands }
}

pub fn handle_exited(
    core: &mut InstanceCore,
    pid: u32,
    report: ExitReport,
    guard: Option<Duration>,
) -> CoreStep {
    if core.status != ProcessStatus::Running || core.pid != pid {
        debug!(id = %core.id, pid, current = core.pid, "exit of a superseded pid ignored");
        return CoreStep::none();
    }

    let mut commands = Vec::new();
    core.pid = 0;

    if core.stop_requested {
        info!(id = %core.id, pid, %report, "process stopped");
        transition(core, ProcessStatus::Stopped, &mut commands);
        return CoreStep { commands };
    }

    match guard {
        Some(delay) => {
            warn!(
                id = %core.id,
                pid,
                %report,
                guard_delay_secs = delay.as_secs(),
                "process exited unexpectedly; guard restart scheduled"
            );
            transition(core, ProcessStatus::Restarting, &mut commands);
            arm(core, TimerKind::Guard, delay, &mut commands);
        }
        None => {
            info!(id = %core.id, pid, %report, "process exited");
            transition(core, ProcessStatus::Stopped, &mut commands);
        }
    }

    CoreStep { commands }
}
