// src/engine/notifier.rs

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::Event;
use crate::types::ProcessStatus;

/// Outbound event sink shared by every instance and the command router.
///
/// Events are delivered in the order they are published. Once the receiving
/// side is gone, publishing is a silent no-op.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Event>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// Create a notifier together with the receiving end of its stream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn status_changed(&self, id: &str, status: ProcessStatus, pid: u32) {
        self.publish(Event::ProcessStatusChanged {
            id: id.to_string(),
            status,
            pid,
        });
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped; event discarded");
        }
    }
}
