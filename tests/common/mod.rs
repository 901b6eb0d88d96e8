#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use procward::config::ProcessDefinition;
use procward::engine::{Notifier, SupervisorEngine};
use procward::fs::mock::MockFileSystem;
use procward::protocol::Event;
use procward::registry::ProcessRegistry;
use procward::router::Router;

pub use procward_test_utils::builders::{mock_registry, DefinitionBuilder, MOCK_STATE_FILE};
pub use procward_test_utils::fake_runner::FakeRunner;
pub use procward_test_utils::{drain_events, init_tracing, settle, status_changes, with_timeout};

/// Engine wired to a [`FakeRunner`] and an in-memory registry.
pub struct Harness {
    pub engine: SupervisorEngine,
    pub router: Router,
    pub registry: Arc<ProcessRegistry>,
    pub runner: FakeRunner,
    pub fs: MockFileSystem,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub ids: Vec<String>,
}

impl Harness {
    pub fn new(defs: Vec<ProcessDefinition>) -> Self {
        init_tracing();
        let (registry, fs, ids) = mock_registry(defs);
        let runner = FakeRunner::new();
        let (notifier, events) = Notifier::channel();
        let engine = SupervisorEngine::new(
            Arc::clone(&registry),
            Arc::new(runner.clone()),
            notifier,
        );
        let router = Router::new(engine.clone());
        Self {
            engine,
            router,
            registry,
            runner,
            fs,
            events,
            ids,
        }
    }

    pub fn id(&self, index: usize) -> String {
        self.ids[index].clone()
    }

    pub fn events(&mut self) -> Vec<Event> {
        drain_events(&mut self.events)
    }
}
