pub mod builders;
pub mod fake_runner;

use std::sync::Once;
use std::time::Duration;

use procward::protocol::Event;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Let every spawned task run until the runtime is idle.
///
/// With a paused clock this advances time by one millisecond, which is far
/// below any delay a definition can carry.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Everything published so far, without waiting.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Only the `processStatusChanged` events for `id`, as `(status, pid)`.
pub fn status_changes(
    events: &[Event],
    id: &str,
) -> Vec<(procward::types::ProcessStatus, u32)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::ProcessStatusChanged {
                id: event_id,
                status,
                pid,
            } if event_id == id => Some((*status, *pid)),
            _ => None,
        })
        .collect()
}
