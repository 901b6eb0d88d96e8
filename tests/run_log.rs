// tests/run_log.rs

use chrono::{Local, TimeZone};
use tempfile::tempdir;
use tracing_subscriber::fmt;

use procward::logging::{run_log_path, run_log_writer};

#[test]
fn run_log_is_named_after_the_start_time() {
    let started = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 2).unwrap();
    let path = run_log_path(std::path::Path::new("/var/log/procward"), started);
    assert_eq!(
        path,
        std::path::PathBuf::from("/var/log/procward/procward_20260307_090502.log")
    );
}

#[test]
fn run_log_creates_directory_and_receives_events() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("nested").join("logs");
    let started = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 2).unwrap();

    let (writer, guard, path) = run_log_writer(&log_dir, started).unwrap();
    assert_eq!(path, run_log_path(&log_dir, started));

    let subscriber = fmt()
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!(id = "api", pid = 4242, "process started");
    });
    // Dropping the guard flushes the background writer.
    drop(guard);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("process started"), "{contents}");
    assert!(contents.contains("pid=4242"), "{contents}");
}

#[test]
fn unusable_log_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "not a directory").unwrap();

    assert!(run_log_writer(&blocker.join("logs"), Local::now()).is_err());
}
