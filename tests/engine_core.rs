// tests/engine_core.rs

use std::time::Duration;

use procward::engine::{CoreCommand, CoreInput, InstanceCore, TimerKind};
use procward::exec::{ExitReport, LaunchError};
use procward::types::ProcessStatus;

fn exit_code(code: i32) -> ExitReport {
    ExitReport {
        code: Some(code),
        signal: None,
    }
}

fn emit(status: ProcessStatus, pid: u32) -> CoreCommand {
    CoreCommand::Emit { status, pid }
}

/// Drive a fresh core to Running with `pid`.
fn running(pid: u32) -> InstanceCore {
    let mut core = InstanceCore::new("svc");
    core.step(CoreInput::Start {
        delay: Duration::ZERO,
    });
    core.step(CoreInput::SpawnSucceeded { pid });
    assert_eq!(core.status(), ProcessStatus::Running);
    core
}

#[test]
fn start_without_delay_passes_through_starting_and_spawns() {
    let mut core = InstanceCore::new("svc");

    let step = core.step(CoreInput::Start {
        delay: Duration::ZERO,
    });
    assert_eq!(
        step.commands,
        vec![emit(ProcessStatus::Starting, 0), CoreCommand::Spawn]
    );
    assert_eq!(core.status(), ProcessStatus::Starting);

    let step = core.step(CoreInput::SpawnSucceeded { pid: 42 });
    assert_eq!(
        step.commands,
        vec![
            emit(ProcessStatus::Running, 42),
            CoreCommand::Watch { pid: 42 }
        ]
    );
    assert_eq!(core.pid(), 42);
}

#[test]
fn start_with_delay_arms_timer_and_spawns_on_firing() {
    let mut core = InstanceCore::new("svc");

    let step = core.step(CoreInput::Start {
        delay: Duration::from_secs(5),
    });
    let generation = match step.commands.as_slice() {
        [CoreCommand::Emit {
            status: ProcessStatus::Starting,
            pid: 0,
        }, CoreCommand::ArmTimer {
            kind: TimerKind::Delay,
            delay,
            generation,
        }] => {
            assert_eq!(*delay, Duration::from_secs(5));
            *generation
        }
        other => panic!("unexpected commands: {other:?}"),
    };

    let step = core.step(CoreInput::TimerFired { generation });
    assert_eq!(step.commands, vec![CoreCommand::Spawn]);
    assert!(core.pending_timer().is_none());
}

#[test]
fn start_is_ignored_while_active() {
    let mut core = running(7);
    let step = core.step(CoreInput::Start {
        delay: Duration::ZERO,
    });
    assert!(step.commands.is_empty());
    assert_eq!(core.status(), ProcessStatus::Running);
    assert_eq!(core.pid(), 7);
}

#[test]
fn stop_while_idle_is_a_no_op() {
    let mut core = InstanceCore::new("svc");
    assert!(core.step(CoreInput::Stop).commands.is_empty());
    assert_eq!(core.status(), ProcessStatus::Stopped);
}

#[test]
fn stop_during_delay_cancels_timer_and_stale_firing_is_ignored() {
    let mut core = InstanceCore::new("svc");
    core.step(CoreInput::Start {
        delay: Duration::from_secs(10),
    });
    let generation = core.pending_timer().expect("timer armed").generation;

    let step = core.step(CoreInput::Stop);
    assert_eq!(
        step.commands,
        vec![CoreCommand::CancelTimer, emit(ProcessStatus::Stopped, 0)]
    );

    let step = core.step(CoreInput::TimerFired { generation });
    assert!(step.commands.is_empty());
    assert_eq!(core.status(), ProcessStatus::Stopped);
}

#[test]
fn stop_while_running_kills_and_exit_lands_in_stopped_even_with_guard() {
    let mut core = running(11);

    let step = core.step(CoreInput::Stop);
    assert_eq!(step.commands, vec![CoreCommand::Kill { pid: 11 }]);
    assert_eq!(core.status(), ProcessStatus::Running);
    assert!(core.stop_requested());

    let step = core.step(CoreInput::Exited {
        pid: 11,
        report: exit_code(0),
        guard: Some(Duration::from_secs(3)),
    });
    assert_eq!(step.commands, vec![emit(ProcessStatus::Stopped, 0)]);
    assert!(core.pending_timer().is_none());
}

#[test]
fn unexpected_exit_with_guard_schedules_restart() {
    let mut core = running(11);

    let step = core.step(CoreInput::Exited {
        pid: 11,
        report: exit_code(1),
        guard: Some(Duration::from_secs(3)),
    });
    let generation = match step.commands.as_slice() {
        [CoreCommand::Emit {
            status: ProcessStatus::Restarting,
            pid: 0,
        }, CoreCommand::ArmTimer {
            kind: TimerKind::Guard,
            delay,
            generation,
        }] => {
            assert_eq!(*delay, Duration::from_secs(3));
            *generation
        }
        other => panic!("unexpected commands: {other:?}"),
    };

    let step = core.step(CoreInput::TimerFired { generation });
    assert_eq!(
        step.commands,
        vec![emit(ProcessStatus::Starting, 0), CoreCommand::Spawn]
    );
}

#[test]
fn unexpected_exit_without_guard_stops() {
    let mut core = running(11);
    let step = core.step(CoreInput::Exited {
        pid: 11,
        report: exit_code(0),
        guard: None,
    });
    assert_eq!(step.commands, vec![emit(ProcessStatus::Stopped, 0)]);
}

#[test]
fn stop_while_restarting_cancels_guard() {
    let mut core = running(11);
    core.step(CoreInput::Exited {
        pid: 11,
        report: exit_code(1),
        guard: Some(Duration::from_secs(30)),
    });
    let generation = core.pending_timer().expect("guard armed").generation;

    let step = core.step(CoreInput::Stop);
    assert_eq!(
        step.commands,
        vec![CoreCommand::CancelTimer, emit(ProcessStatus::Stopped, 0)]
    );
    assert!(core.step(CoreInput::TimerFired { generation }).commands.is_empty());
}

#[test]
fn exit_of_superseded_pid_is_ignored() {
    let mut core = running(11);
    let step = core.step(CoreInput::Exited {
        pid: 10,
        report: exit_code(1),
        guard: Some(Duration::from_secs(1)),
    });
    assert!(step.commands.is_empty());
    assert_eq!(core.status(), ProcessStatus::Running);
    assert_eq!(core.pid(), 11);
}

#[test]
fn launch_failure_is_terminal_until_next_start() {
    let mut core = InstanceCore::new("svc");
    core.step(CoreInput::Start {
        delay: Duration::ZERO,
    });
    let step = core.step(CoreInput::SpawnFailed {
        error: LaunchError::PathNotFound("/missing".into()),
    });
    assert_eq!(step.commands, vec![emit(ProcessStatus::Failed, 0)]);
    assert!(core.pending_timer().is_none());

    let step = core.step(CoreInput::Start {
        delay: Duration::ZERO,
    });
    assert_eq!(
        step.commands,
        vec![emit(ProcessStatus::Starting, 0), CoreCommand::Spawn]
    );
}

#[test]
fn every_arm_uses_a_fresh_generation() {
    let mut core = InstanceCore::new("svc");
    core.step(CoreInput::Start {
        delay: Duration::from_secs(1),
    });
    let first = core.pending_timer().expect("armed").generation;
    core.step(CoreInput::Stop);
    core.step(CoreInput::Start {
        delay: Duration::from_secs(1),
    });
    let second = core.pending_timer().expect("armed").generation;

    assert_ne!(first, second);
    assert!(core.step(CoreInput::TimerFired { generation: first }).commands.is_empty());
    assert_eq!(
        core.step(CoreInput::TimerFired { generation: second }).commands,
        vec![CoreCommand::Spawn]
    );
}
