// src/protocol.rs

//! Message contract with the front end.
//!
//! Inbound commands are JSON objects tagged by `"action"`, outbound events
//! are tagged by `"type"`. Both travel as one JSON document per line.
//!
//! ```json
//! {"action":"startProcess","id":"5f0c…"}
//! {"type":"processStatusChanged","id":"5f0c…","status":"running","pid":4242}
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{GlobalConfig, ProcessDefinition, RawProcessDefinition};
use crate::errors::ProcwardError;
use crate::types::ProcessStatus;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    GetProcessList,
    StartAll,
    StopAll,
    StartProcess { id: String },
    StopProcess { id: String },
    AddProcess { process: RawProcessDefinition },
    UpdateProcess { process: RawProcessDefinition },
    DeleteProcess { id: String },
    GetConfig,
    SaveConfig { config: GlobalConfig },
    /// Host/UI-only; the supervisor answers it with `commandFailed`.
    OpenFilePicker,
}

impl Command {
    /// Wire name of the command.
    pub fn action(&self) -> &'static str {
        match self {
            Command::GetProcessList => "getProcessList",
            Command::StartAll => "startAll",
            Command::StopAll => "stopAll",
            Command::StartProcess { .. } => "startProcess",
            Command::StopProcess { .. } => "stopProcess",
            Command::AddProcess { .. } => "addProcess",
            Command::UpdateProcess { .. } => "updateProcess",
            Command::DeleteProcess { .. } => "deleteProcess",
            Command::GetConfig => "getConfig",
            Command::SaveConfig { .. } => "saveConfig",
            Command::OpenFilePicker => "openFilePicker",
        }
    }

    /// Id the command is aimed at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Command::StartProcess { id }
            | Command::StopProcess { id }
            | Command::DeleteProcess { id } => Some(id),
            Command::UpdateProcess { process } => process.id.as_deref(),
            _ => None,
        }
    }
}

/// A definition joined with its runtime status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessView {
    #[serde(flatten)]
    pub definition: ProcessDefinition,
    pub status: ProcessStatus,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    ProcessListResponse {
        processes: Vec<ProcessView>,
    },
    ProcessStatusChanged {
        id: String,
        status: ProcessStatus,
        pid: u32,
    },
    ConfigResponse {
        auto_start_on_open: bool,
    },
    CommandFailed {
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        error: String,
        message: String,
    },
}

impl Event {
    pub fn command_failed(action: impl Into<String>, id: Option<String>, err: &ProcwardError) -> Self {
        Event::CommandFailed {
            action: action.into(),
            id,
            error: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Parse one inbound line.
///
/// On failure the returned action is whatever `"action"` the line carried,
/// or `"unknown"`, so the rejection can still be attributed.
pub fn parse_command(line: &str) -> Result<Command, (String, ProcwardError)> {
    serde_json::from_str::<Command>(line).map_err(|err| {
        let action = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("action").and_then(|a| a.as_str()).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        (action, ProcwardError::from(err))
    })
}
