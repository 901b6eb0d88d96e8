// src/exec/os_runner.rs

//! Runner backed by real OS processes.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::ProcessDefinition;
use crate::exec::args::split_args;
use crate::exec::runner::{BoxFuture, ExitReport, LaunchError, ProcessRunner};
use crate::exec::tree::ProcessTree;
use crate::types::ProcessKind;

/// How long to wait for the exit after a forced kill before giving up.
const FORCED_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between liveness checks on the rest of a process tree.
const TREE_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Handle kept for every process this runner started.
struct LiveChild {
    exit_rx: watch::Receiver<Option<ExitReport>>,
    tree: Arc<ProcessTree>,
    watched: bool,
}

impl LiveChild {
    fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }
}

/// Spawns processes with `tokio::process`.
///
/// Each child leads its own process tree (a process group on Unix, a job
/// object on Windows), so a kill reaches everything a script started. A
/// background task per child waits for the exit, reaps what is left of the
/// tree and publishes the exit on a `watch` channel; `watch` and `kill`
/// both observe that channel.
#[derive(Clone)]
pub struct OsProcessRunner {
    grace: Duration,
    live: Arc<Mutex<HashMap<u32, LiveChild>>>,
}

impl std::fmt::Debug for OsProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsProcessRunner")
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl OsProcessRunner {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u32, LiveChild>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessRunner for OsProcessRunner {
    fn spawn(&self, def: &ProcessDefinition) -> Result<u32, LaunchError> {
        let mut cmd = build_command(def)?;

        let mut child = cmd.spawn().map_err(|e| launch_error(Path::new(&def.path), e))?;
        let pid = child
            .id()
            .ok_or_else(|| LaunchError::LaunchFailed("process exited before a pid was assigned".into()))?;

        info!(
            id = %def.id,
            pid,
            path = %def.path,
            kind = def.kind.as_str(),
            background = def.background,
            "spawned process"
        );

        let (exit_tx, exit_rx) = watch::channel(None);
        let leader_kill = Arc::new(Notify::new());

        #[cfg(windows)]
        let tree = Arc::new(ProcessTree::new(pid, Arc::clone(&leader_kill), child.raw_handle()));
        #[cfg(not(windows))]
        let tree = Arc::new(ProcessTree::new(pid, Arc::clone(&leader_kill)));

        let waiter_tree = Arc::clone(&tree);
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = leader_kill.notified() => {
                    if let Err(e) = child.start_kill() {
                        debug!(pid, error = %e, "forced kill failed; process may have exited");
                    }
                    child.wait().await
                }
            };

            let report = match status {
                Ok(status) => ExitReport::from_status(status),
                Err(e) => {
                    warn!(pid, error = %e, "failed to wait for process");
                    ExitReport::default()
                }
            };
            debug!(pid, %report, "process exited");

            // Nothing the process left behind may outlive the reported exit.
            waiter_tree.reap();
            let _ = exit_tx.send(Some(report));
        });

        let mut live = self.live();
        live.retain(|_, c| !(c.watched && c.has_exited()));
        live.insert(
            pid,
            LiveChild {
                exit_rx,
                tree,
                watched: false,
            },
        );

        Ok(pid)
    }

    fn watch(&self, pid: u32) -> BoxFuture<'static, ExitReport> {
        let rx = self.live().get_mut(&pid).map(|c| {
            c.watched = true;
            c.exit_rx.clone()
        });

        Box::pin(async move {
            match rx {
                Some(mut rx) => wait_exit(&mut rx).await,
                None => ExitReport::default(),
            }
        })
    }

    fn kill(&self, pid: u32) -> BoxFuture<'static, ()> {
        let handle = self
            .live()
            .get(&pid)
            .map(|c| (c.exit_rx.clone(), Arc::clone(&c.tree)));
        let grace = self.grace;

        Box::pin(async move {
            let Some((mut rx, tree)) = handle else {
                debug!(pid, "kill requested for unknown pid; nothing to do");
                return;
            };
            if rx.borrow().is_some() && !tree.is_alive() {
                debug!(pid, "kill requested for exited pid; nothing to do");
                return;
            }

            tree.terminate();
            if wait_tree_gone(&tree, &mut rx, Instant::now() + grace).await {
                return;
            }

            warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "process tree still running after grace period; forcing termination"
            );
            tree.force();
            if timeout(FORCED_KILL_TIMEOUT, wait_exit(&mut rx)).await.is_err() {
                warn!(pid, "process still running after forced termination; giving up");
            }
        })
    }

    fn detach(&self, pid: u32) {
        if let Some(child) = self.live().remove(&pid) {
            child.tree.detach();
            info!(pid, "detached process; it will outlive the supervisor");
        }
    }
}

async fn wait_exit(rx: &mut watch::Receiver<Option<ExitReport>>) -> ExitReport {
    match rx.wait_for(|r| r.is_some()).await {
        Ok(report) => (*report).unwrap_or_default(),
        // The waiter task is gone; treat the process as exited.
        Err(_) => ExitReport::default(),
    }
}

/// Wait until the leader has exited and no other member of its tree is
/// left, or until `deadline`. Returns whether the tree is gone.
async fn wait_tree_gone(
    tree: &ProcessTree,
    rx: &mut watch::Receiver<Option<ExitReport>>,
    deadline: Instant,
) -> bool {
    if timeout_at(deadline, wait_exit(rx)).await.is_err() {
        return false;
    }
    loop {
        if !tree.is_alive() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(TREE_POLL_INTERVAL).await;
    }
}

/// Build the command for `def` after checking that the path is usable.
fn build_command(def: &ProcessDefinition) -> Result<Command, LaunchError> {
    let path = Path::new(&def.path);
    preflight(def, path)?;

    let args = split_args(&def.args);
    let mut cmd = shell_command(def.kind, path, &def.args, &args);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    // stdout carries the event stream, so children never write to it.
    cmd.stdin(Stdio::null()).stdout(Stdio::null());
    if def.background {
        cmd.stderr(Stdio::null());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    // Detached children must survive the runner being dropped.
    cmd.kill_on_drop(false);

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        if def.background {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
    }

    Ok(cmd)
}

#[cfg(windows)]
fn shell_command(kind: ProcessKind, path: &Path, raw_args: &str, args: &[String]) -> Command {
    match kind {
        ProcessKind::Bat => {
            let mut c = Command::new("cmd.exe");
            c.arg("/c").raw_arg(format!("\"\"{}\"\"", path.display()));
            if !raw_args.trim().is_empty() {
                c.raw_arg(raw_args);
            }
            c
        }
        ProcessKind::Exe => {
            let mut c = Command::new(path);
            c.args(args);
            c
        }
    }
}

#[cfg(not(windows))]
fn shell_command(kind: ProcessKind, path: &Path, _raw_args: &str, args: &[String]) -> Command {
    match kind {
        ProcessKind::Bat => {
            let mut c = Command::new("sh");
            c.arg(path).args(args);
            c
        }
        ProcessKind::Exe => {
            let mut c = Command::new(path);
            c.args(args);
            c
        }
    }
}

fn preflight(def: &ProcessDefinition, path: &Path) -> Result<(), LaunchError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => return Err(launch_error(path, e)),
    };

    if meta.is_dir() {
        return Err(LaunchError::LaunchFailed(format!(
            "{} is a directory",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if def.kind == ProcessKind::Exe && meta.permissions().mode() & 0o111 == 0 {
            return Err(LaunchError::PermissionDenied(path.to_path_buf()));
        }
    }
    #[cfg(not(unix))]
    let _ = def;

    Ok(())
}

fn launch_error(path: &Path, err: io::Error) -> LaunchError {
    match err.kind() {
        io::ErrorKind::NotFound => LaunchError::PathNotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(path.to_path_buf()),
        _ => LaunchError::LaunchFailed(format!("{}: {err}", path.display())),
    }
}
