// tests/os_runner_unix.rs
#![cfg(unix)]

mod common;

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use tempfile::TempDir;

use crate::common::{init_tracing, with_timeout, DefinitionBuilder};

use procward::exec::{LaunchError, OsProcessRunner, ProcessRunner};
use procward::types::ProcessKind;

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

fn runner(grace_ms: u64) -> OsProcessRunner {
    init_tracing();
    OsProcessRunner::new(Duration::from_millis(grace_ms))
}

fn shell(args: &str) -> procward::config::ProcessDefinition {
    DefinitionBuilder::new("sh").path("/bin/sh").args(args).build()
}

/// Write a script that is never executed directly.
fn script(dir: &TempDir, name: &str, body: &str, mode: u32) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn exit_code_is_reported() {
    let runner = runner(1000);
    let pid = runner.spawn(&shell(r#"-c "exit 3""#)).unwrap();

    let report = with_timeout(runner.watch(pid)).await;
    assert_eq!(report.code, Some(3));
    assert!(!report.success());
}

#[tokio::test]
async fn kill_terminates_gracefully_first() {
    let runner = runner(2000);
    let pid = runner.spawn(&shell(r#"-c "sleep 30""#)).unwrap();
    let exited = runner.watch(pid);

    with_timeout(runner.kill(pid)).await;
    let report = with_timeout(exited).await;
    assert_eq!(report.signal, Some(SIGTERM));
}

#[tokio::test]
async fn kill_escalates_when_term_is_ignored() {
    let runner = runner(300);
    let pid = runner
        .spawn(&shell(r#"-c "trap '' TERM; while :; do sleep 0.1; done""#))
        .unwrap();
    let exited = runner.watch(pid);

    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    with_timeout(runner.kill(pid)).await;
    let report = with_timeout(exited).await;
    assert_eq!(report.signal, Some(SIGKILL));
}

#[tokio::test]
async fn kill_is_idempotent() {
    let runner = runner(1000);
    let pid = runner.spawn(&shell(r#"-c "exit 0""#)).unwrap();
    let report = with_timeout(runner.watch(pid)).await;
    assert!(report.success());

    with_timeout(runner.kill(pid)).await;
    with_timeout(runner.kill(pid)).await;
    with_timeout(runner.kill(u32::MAX - 1)).await;
}

#[tokio::test]
async fn missing_path_is_path_not_found() {
    let runner = runner(1000);
    let def = DefinitionBuilder::new("ghost")
        .path("/definitely/not/here/ghost")
        .build();

    assert_eq!(
        runner.spawn(&def),
        Err(LaunchError::PathNotFound("/definitely/not/here/ghost".into()))
    );
}

#[tokio::test]
async fn non_executable_exe_is_permission_denied() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "plain.sh", "exit 0", 0o644);
    let def = DefinitionBuilder::new("plain").path(&path).build();

    assert_eq!(
        runner(1000).spawn(&def),
        Err(LaunchError::PermissionDenied(path.into()))
    );
}

#[tokio::test]
async fn directory_path_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let def = DefinitionBuilder::new("dir")
        .path(&dir.path().to_string_lossy())
        .build();

    assert!(matches!(
        runner(1000).spawn(&def),
        Err(LaunchError::LaunchFailed(_))
    ));
}

#[tokio::test]
async fn bat_scripts_run_through_sh_with_args() {
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "job.bat", r#"exit "$1""#, 0o644);
    let def = DefinitionBuilder::new("job")
        .path(&path)
        .kind(ProcessKind::Bat)
        .args("5 ignored")
        .build();

    let runner = runner(1000);
    let pid = runner.spawn(&def).unwrap();
    let report = with_timeout(runner.watch(pid)).await;
    assert_eq!(report.code, Some(5));
}

#[tokio::test]
async fn detached_process_is_left_running() {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let runner = runner(1000);
    let pid = runner.spawn(&shell(r#"-c "sleep 30""#)).unwrap();
    runner.detach(pid);

    // No longer tracked: kill is a no-op.
    with_timeout(runner.kill(pid)).await;
    let raw = Pid::from_raw(pid as i32);
    assert!(kill(raw, None).is_ok());

    killpg(raw, Signal::SIGKILL).unwrap();
}

/// Whether `pid` is running. Zombies waiting for a reaper count as gone.
fn running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) if std::path::Path::new("/proc/self").exists() => false,
        Err(_) => nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok(),
    }
}

async fn gone_within(pid: i32, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if !running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    !running(pid)
}

/// Pid written by a script member once it is set up.
async fn member_pid(file: &std::path::Path) -> i32 {
    with_timeout(async {
        loop {
            if let Ok(text) = std::fs::read_to_string(file) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
}

fn tree_script(dir: &TempDir, body: &str) -> (procward::config::ProcessDefinition, std::path::PathBuf) {
    let pid_file = dir.path().join("member.pid");
    let path = script(dir, "tree.bat", body, 0o644);
    let def = DefinitionBuilder::new("tree")
        .path(&path)
        .kind(ProcessKind::Bat)
        .args(&pid_file.to_string_lossy())
        .build();
    (def, pid_file)
}

#[tokio::test]
async fn kill_escalates_for_members_that_ignore_term() {
    let dir = tempfile::tempdir().unwrap();
    let (def, pid_file) = tree_script(
        &dir,
        r#"sh -c 'trap "" TERM; echo $$ > "$1"; while :; do sleep 0.1; done' member "$1" &
wait"#,
    );

    let runner = runner(300);
    let pid = runner.spawn(&def).unwrap();
    let member = member_pid(&pid_file).await;
    assert!(running(member));

    with_timeout(runner.kill(pid)).await;
    assert!(gone_within(member, Duration::from_secs(2)).await, "member {member} survived kill");
}

#[tokio::test]
async fn leader_exit_takes_the_rest_of_the_tree_down() {
    let dir = tempfile::tempdir().unwrap();
    let (def, pid_file) = tree_script(
        &dir,
        r#"sleep 60 &
echo $! > "$1"
exit 1"#,
    );

    let runner = runner(1000);
    let pid = runner.spawn(&def).unwrap();
    let report = with_timeout(runner.watch(pid)).await;
    assert_eq!(report.code, Some(1));

    let member = member_pid(&pid_file).await;
    assert!(gone_within(member, Duration::from_secs(2)).await, "member {member} outlived its leader");
}

#[tokio::test]
async fn detached_tree_survives_leader_exit() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let dir = tempfile::tempdir().unwrap();
    let (def, pid_file) = tree_script(
        &dir,
        r#"sleep 60 &
echo $! > "$1"
sleep 0.5
exit 0"#,
    );

    let runner = runner(1000);
    let pid = runner.spawn(&def).unwrap();
    let member = member_pid(&pid_file).await;
    runner.detach(pid);

    assert!(gone_within(pid as i32, Duration::from_secs(3)).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(running(member));

    kill(Pid::from_raw(member), Signal::SIGKILL).unwrap();
}
