use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use procward::config::ProcessDefinition;
use procward::exec::{BoxFuture, ExitReport, LaunchError, ProcessRunner};
use tokio::sync::watch;

/// Signal number reported for processes terminated through `kill`.
pub const FAKE_KILL_SIGNAL: i32 = 15;

/// A fake runner that:
/// - hands out increasing pids without starting anything
/// - records spawns, kills and detaches
/// - lets the test decide when a process "exits" via [`FakeRunner::crash`]
/// - terminates a process immediately when asked to kill it.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_pid: u32,
    spawned: Vec<(String, u32)>,
    killed: Vec<u32>,
    detached: Vec<u32>,
    failures: HashMap<String, LaunchError>,
    exits: HashMap<u32, watch::Sender<Option<ExitReport>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Every spawn of a definition at `path` fails with `error`.
    pub fn fail_path(&self, path: &str, error: LaunchError) {
        self.state().failures.insert(path.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Make `pid` exit on its own with `code`.
    pub fn crash(&self, pid: u32, code: i32) {
        self.finish(
            pid,
            ExitReport {
                code: Some(code),
                signal: None,
            },
        );
    }

    /// `(definition id, pid)` for every successful spawn, in order.
    pub fn spawned(&self) -> Vec<(String, u32)> {
        self.state().spawned.clone()
    }

    pub fn spawn_count(&self, id: &str) -> usize {
        self.state().spawned.iter().filter(|(i, _)| i == id).count()
    }

    /// Pid of the most recent spawn of `id`.
    pub fn last_pid(&self, id: &str) -> Option<u32> {
        self.state()
            .spawned
            .iter()
            .rev()
            .find(|(i, _)| i == id)
            .map(|(_, pid)| *pid)
    }

    pub fn killed(&self) -> Vec<u32> {
        self.state().killed.clone()
    }

    pub fn detached(&self) -> Vec<u32> {
        self.state().detached.clone()
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.state()
            .exits
            .get(&pid)
            .is_some_and(|tx| tx.borrow().is_none())
    }

    fn finish(&self, pid: u32, report: ExitReport) {
        let state = self.state();
        if let Some(tx) = state.exits.get(&pid) {
            if tx.borrow().is_none() {
                tx.send_replace(Some(report));
            }
        }
    }
}

impl ProcessRunner for FakeRunner {
    fn spawn(&self, def: &ProcessDefinition) -> Result<u32, LaunchError> {
        let mut state = self.state();
        if let Some(error) = state.failures.get(&def.path) {
            return Err(error.clone());
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.spawned.push((def.id.clone(), pid));
        let (tx, _rx) = watch::channel(None);
        state.exits.insert(pid, tx);
        Ok(pid)
    }

    fn watch(&self, pid: u32) -> BoxFuture<'static, ExitReport> {
        let rx = self.state().exits.get(&pid).map(|tx| tx.subscribe());
        Box::pin(async move {
            let Some(mut rx) = rx else {
                return ExitReport::default();
            };
            match rx.wait_for(|r| r.is_some()).await {
                Ok(report) => (*report).unwrap_or_default(),
                Err(_) => ExitReport::default(),
            }
        })
    }

    fn kill(&self, pid: u32) -> BoxFuture<'static, ()> {
        self.state().killed.push(pid);
        self.finish(
            pid,
            ExitReport {
                code: None,
                signal: Some(FAKE_KILL_SIGNAL),
            },
        );
        Box::pin(async {})
    }

    fn detach(&self, pid: u32) {
        self.state().detached.push(pid);
    }
}
