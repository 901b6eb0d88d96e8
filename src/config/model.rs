// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ProcessKind, ShutdownPolicy};

/// Upper bound for `delaySeconds`.
pub const MAX_DELAY_SECONDS: u32 = 300;
/// Upper bound for `guardDelaySeconds`.
pub const MAX_GUARD_DELAY_SECONDS: u32 = 60;

pub const DEFAULT_GUARD_DELAY_SECONDS: u32 = 3;
pub const DEFAULT_STATE_FILE: &str = "procward.json";
pub const DEFAULT_KILL_GRACE_MS: u64 = 3000;

/// Fresh, unique definition id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A validated, durable process definition.
///
/// Serialized field names match the front-end contract:
///
/// ```json
/// {
///   "id": "5f0c…",
///   "name": "worker",
///   "path": "/opt/worker/run.sh",
///   "type": "bat",
///   "args": "--port 8080",
///   "delaySeconds": 0,
///   "guardEnabled": true,
///   "guardDelaySeconds": 3,
///   "enabled": true,
///   "background": false
/// }
/// ```
///
/// Deserialization goes through [`RawProcessDefinition`], so defaults and
/// validation always apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawProcessDefinition")]
pub struct ProcessDefinition {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ProcessKind,
    pub args: String,
    pub delay_seconds: u32,
    pub guard_enabled: bool,
    pub guard_delay_seconds: u32,
    pub enabled: bool,
    pub background: bool,
}

/// A definition as it arrives from the wire or from disk: every field is
/// optional.
///
/// Numeric fields are signed so that a negative delay is reported as a
/// validation error rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProcessDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProcessKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_delay_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
}

impl From<&ProcessDefinition> for RawProcessDefinition {
    fn from(def: &ProcessDefinition) -> Self {
        Self {
            id: Some(def.id.clone()),
            name: Some(def.name.clone()),
            path: Some(def.path.clone()),
            kind: Some(def.kind),
            args: Some(def.args.clone()),
            delay_seconds: Some(i64::from(def.delay_seconds)),
            guard_enabled: Some(def.guard_enabled),
            guard_delay_seconds: Some(i64::from(def.guard_delay_seconds)),
            enabled: Some(def.enabled),
            background: Some(def.background),
        }
    }
}

/// Global configuration record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub auto_start_on_open: bool,
}

/// On-disk layout of the durable state file, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStateFile {
    #[serde(default)]
    pub auto_start_on_open: bool,
    #[serde(default)]
    pub processes: Vec<RawProcessDefinition>,
}

/// Validated durable state: global config plus every definition, in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    pub auto_start_on_open: bool,
    pub processes: Vec<ProcessDefinition>,
}

impl StateFile {
    pub fn global(&self) -> GlobalConfig {
        GlobalConfig {
            auto_start_on_open: self.auto_start_on_open,
        }
    }
}

/// Supervisor settings as read from `Procward.toml`.
///
/// ```toml
/// [supervisor]
/// state_file = "procward.json"
/// kill_grace_ms = 3000
/// shutdown_policy = "stop_all"
/// log_dir = "logs"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// Where definitions and global config are persisted (JSON).
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Grace period between the graceful and the forced kill.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,

    /// Directory for the per-run log file. Unset means stderr only.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_kill_grace_ms() -> u64 {
    DEFAULT_KILL_GRACE_MS
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            kill_grace_ms: default_kill_grace_ms(),
            shutdown_policy: ShutdownPolicy::default(),
            log_dir: None,
        }
    }
}

/// Validated supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_file: PathBuf,
    pub kill_grace: std::time::Duration,
    pub shutdown_policy: ShutdownPolicy,
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            kill_grace: std::time::Duration::from_millis(DEFAULT_KILL_GRACE_MS),
            shutdown_policy: ShutdownPolicy::default(),
            log_dir: None,
        }
    }
}
