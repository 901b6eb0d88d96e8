// src/engine/actor.rs

//! Async shell around one [`InstanceCore`].
//!
//! Each supervised id gets its own Tokio task with an unbounded mailbox.
//! Commands, timer firings and exit notifications for that id all arrive
//! through the mailbox, so they are handled strictly one at a time. The
//! timer and watcher tasks only hold a weak sender: once the supervisor drops
//! the instance handle, their late messages go nowhere.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProcessDefinition;
use crate::engine::core::InstanceCore;
use crate::engine::notifier::Notifier;
use crate::engine::transitions::CoreCommand;
use crate::engine::{CoreInput, ProcessId, TimerKind};
use crate::errors::{ProcwardError, Result};
use crate::exec::{ExitReport, LaunchError, ProcessRunner};
use crate::registry::ProcessRegistry;
use crate::types::ProcessStatus;

/// Runtime view of one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceSnapshot {
    pub status: ProcessStatus,
    pub pid: u32,
}

/// Messages handled by an instance actor.
#[derive(Debug)]
pub(crate) enum InstanceMsg {
    Start,
    Stop,
    Delete {
        reply: oneshot::Sender<Result<ProcessDefinition>>,
    },
    Snapshot {
        reply: oneshot::Sender<InstanceSnapshot>,
    },
    /// Stop (or detach) and end the actor once idle.
    Shutdown {
        detach_background: bool,
        reply: oneshot::Sender<()>,
    },
    TimerFired {
        generation: u64,
    },
    Exited {
        pid: u32,
        report: ExitReport,
    },
}

/// Sending side of an instance mailbox.
#[derive(Debug, Clone)]
pub(crate) struct InstanceHandle {
    tx: mpsc::UnboundedSender<InstanceMsg>,
}

impl InstanceHandle {
    /// Spawn a new actor for `id` in the Stopped state.
    pub(crate) fn spawn(
        id: ProcessId,
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn ProcessRunner>,
        notifier: Notifier,
    ) -> Self {
        let (tx, mailbox) = mpsc::unbounded_channel();
        let actor = InstanceActor {
            core: InstanceCore::new(id.clone()),
            id,
            registry,
            runner,
            notifier,
            mailbox,
            self_tx: tx.downgrade(),
            timer: None,
            shutting_down: false,
            idle_waiters: Vec::new(),
        };
        tokio::spawn(actor.run());
        Self { tx }
    }

    /// Fire-and-forget send. Returns false when the actor is gone.
    pub(crate) fn send(&self, msg: InstanceMsg) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub(crate) fn same_instance(&self, other: &InstanceHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    pub(crate) async fn snapshot(&self) -> InstanceSnapshot {
        let (reply, rx) = oneshot::channel();
        if !self.send(InstanceMsg::Snapshot { reply }) {
            return InstanceSnapshot::default();
        }
        rx.await.unwrap_or_default()
    }

    pub(crate) async fn delete(&self, id: &str) -> Result<ProcessDefinition> {
        let (reply, rx) = oneshot::channel();
        if !self.send(InstanceMsg::Delete { reply }) {
            return Err(ProcwardError::NotFound(id.to_string()));
        }
        rx.await
            .unwrap_or_else(|_| Err(ProcwardError::NotFound(id.to_string())))
    }

    pub(crate) async fn shutdown(&self, detach_background: bool) {
        let (reply, rx) = oneshot::channel();
        if self.send(InstanceMsg::Shutdown {
            detach_background,
            reply,
        }) {
            let _ = rx.await;
        }
    }
}

struct InstanceActor {
    id: ProcessId,
    core: InstanceCore,
    registry: Arc<ProcessRegistry>,
    runner: Arc<dyn ProcessRunner>,
    notifier: Notifier,
    mailbox: mpsc::UnboundedReceiver<InstanceMsg>,
    self_tx: mpsc::WeakUnboundedSender<InstanceMsg>,
    timer: Option<CancellationToken>,
    shutting_down: bool,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl InstanceActor {
    async fn run(mut self) {
        debug!(id = %self.id, "instance actor started");

        while let Some(msg) = self.mailbox.recv().await {
            if self.handle(msg) {
                break;
            }
            if self.shutting_down && self.core.status().is_idle() {
                for waiter in self.idle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
                break;
            }
        }

        self.cancel_timer();
        debug!(id = %self.id, "instance actor finished");
    }

    /// Handle one message. Returns true when the actor must end.
    fn handle(&mut self, msg: InstanceMsg) -> bool {
        match msg {
            InstanceMsg::Start => {
                if self.shutting_down {
                    debug!(id = %self.id, "start ignored; shutting down");
                    return false;
                }
                match self.registry.get(&self.id) {
                    Ok(def) => {
                        let delay = Duration::from_secs(u64::from(def.delay_seconds));
                        self.apply(CoreInput::Start { delay });
                    }
                    Err(e) => warn!(id = %self.id, error = %e, "start ignored"),
                }
            }
            InstanceMsg::Stop => self.apply(CoreInput::Stop),
            InstanceMsg::TimerFired { generation } => {
                self.apply(CoreInput::TimerFired { generation })
            }
            InstanceMsg::Exited { pid, report } => {
                // Guard settings are read at exit time so edits made while
                // the process was running take effect.
                let guard = self
                    .registry
                    .get(&self.id)
                    .ok()
                    .filter(|def| def.guard_enabled)
                    .map(|def| Duration::from_secs(u64::from(def.guard_delay_seconds)));
                self.apply(CoreInput::Exited { pid, report, guard });
            }
            InstanceMsg::Snapshot { reply } => {
                let _ = reply.send(InstanceSnapshot {
                    status: self.core.status(),
                    pid: self.core.pid(),
                });
            }
            InstanceMsg::Delete { reply } => {
                if !self.core.status().is_idle() {
                    let _ = reply.send(Err(ProcwardError::InUse(format!(
                        "{} is {}; stop it first",
                        self.id,
                        self.core.status()
                    ))));
                    return false;
                }
                let result = self.registry.remove(&self.id);
                let removed = matches!(result, Ok(_) | Err(ProcwardError::Persistence(_)));
                let _ = reply.send(result);
                return removed;
            }
            InstanceMsg::Shutdown {
                detach_background,
                reply,
            } => {
                self.shutting_down = true;
                if detach_background && self.detach_if_background() {
                    let _ = reply.send(());
                    return true;
                }
                self.apply(CoreInput::Stop);
                self.idle_waiters.push(reply);
            }
        }
        false
    }

    fn detach_if_background(&mut self) -> bool {
        if self.core.status() != ProcessStatus::Running {
            return false;
        }
        let background = self
            .registry
            .get(&self.id)
            .map(|def| def.background)
            .unwrap_or(false);
        if !background {
            return false;
        }
        info!(id = %self.id, pid = self.core.pid(), "leaving background process running");
        self.runner.detach(self.core.pid());
        true
    }

    /// Feed `input` to the core and carry out the resulting commands. Spawn
    /// results are fed straight back in before returning.
    fn apply(&mut self, input: CoreInput) {
        let mut pending = VecDeque::from([input]);

        while let Some(input) = pending.pop_front() {
            let step = self.core.step(input);
            for command in step.commands {
                match command {
                    CoreCommand::Emit { status, pid } => {
                        self.notifier.status_changed(&self.id, status, pid)
                    }
                    CoreCommand::ArmTimer {
                        kind,
                        delay,
                        generation,
                    } => self.arm_timer(kind, delay, generation),
                    CoreCommand::CancelTimer => self.cancel_timer(),
                    CoreCommand::Spawn => pending.push_back(self.spawn_process()),
                    CoreCommand::Watch { pid } => self.watch(pid),
                    CoreCommand::Kill { pid } => {
                        tokio::spawn(self.runner.kill(pid));
                    }
                }
            }
        }
    }

    fn spawn_process(&self) -> CoreInput {
        let def = match self.registry.get(&self.id) {
            Ok(def) => def,
            Err(_) => {
                return CoreInput::SpawnFailed {
                    error: LaunchError::LaunchFailed(format!(
                        "definition {} no longer exists",
                        self.id
                    )),
                };
            }
        };

        match self.runner.spawn(&def) {
            Ok(pid) => CoreInput::SpawnSucceeded { pid },
            Err(error) => CoreInput::SpawnFailed { error },
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration, generation: u64) {
        self.cancel_timer();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.self_tx.clone();
        let id = self.id.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!(%id, ?kind, generation, "timer cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(InstanceMsg::TimerFired { generation });
                    }
                }
            }
        });

        self.timer = Some(token);
    }

    fn cancel_timer(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }

    fn watch(&self, pid: u32) {
        let exited = self.runner.watch(pid);
        let tx = self.self_tx.clone();

        tokio::spawn(async move {
            let report = exited.await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(InstanceMsg::Exited { pid, report });
            }
        });
    }
}
