#![allow(dead_code)]

use std::sync::Arc;

use procward::config::{ProcessDefinition, RawProcessDefinition};
use procward::fs::mock::MockFileSystem;
use procward::registry::ProcessRegistry;
use procward::types::ProcessKind;

/// Location of the state file inside a [`MockFileSystem`].
pub const MOCK_STATE_FILE: &str = "/state/procward.json";

/// Builder for `ProcessDefinition` to simplify test setup.
///
/// Starts from an enabled foreground executable with no delay and guard
/// disabled, so tests opt into restarts explicitly.
pub struct DefinitionBuilder {
    raw: RawProcessDefinition,
}

impl DefinitionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            raw: RawProcessDefinition {
                name: Some(name.to_string()),
                path: Some(format!("/opt/{name}/{name}")),
                kind: Some(ProcessKind::Exe),
                delay_seconds: Some(0),
                guard_enabled: Some(false),
                enabled: Some(true),
                background: Some(false),
                ..RawProcessDefinition::default()
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.raw.id = Some(id.to_string());
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.raw.path = Some(path.to_string());
        self
    }

    pub fn kind(mut self, kind: ProcessKind) -> Self {
        self.raw.kind = Some(kind);
        self
    }

    pub fn args(mut self, args: &str) -> Self {
        self.raw.args = Some(args.to_string());
        self
    }

    pub fn delay(mut self, seconds: i64) -> Self {
        self.raw.delay_seconds = Some(seconds);
        self
    }

    /// Enable the guard with the given restart delay.
    pub fn guard(mut self, delay_seconds: i64) -> Self {
        self.raw.guard_enabled = Some(true);
        self.raw.guard_delay_seconds = Some(delay_seconds);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.raw.enabled = Some(enabled);
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.raw.background = Some(background);
        self
    }

    pub fn build_raw(self) -> RawProcessDefinition {
        self.raw
    }

    pub fn build(self) -> ProcessDefinition {
        ProcessDefinition::try_from(self.raw).expect("Failed to build valid definition from builder")
    }
}

/// Registry on an in-memory filesystem, pre-populated with `defs`.
///
/// Returns the registry, the filesystem (to inspect writes or make them fail)
/// and the ids the registry assigned, in the order of `defs`.
pub fn mock_registry(
    defs: Vec<ProcessDefinition>,
) -> (Arc<ProcessRegistry>, MockFileSystem, Vec<String>) {
    let fs = MockFileSystem::new();
    let registry = ProcessRegistry::open(Arc::new(fs.clone()), MOCK_STATE_FILE)
        .expect("Failed to open registry on mock filesystem");

    let ids = defs
        .into_iter()
        .map(|def| registry.add(def).expect("Failed to add definition"))
        .collect();

    (Arc::new(registry), fs, ids)
}
