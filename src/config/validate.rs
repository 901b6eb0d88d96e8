// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::model::{
    new_id, ProcessDefinition, RawProcessDefinition, RawSettings, RawStateFile, Settings,
    StateFile, DEFAULT_GUARD_DELAY_SECONDS, MAX_DELAY_SECONDS, MAX_GUARD_DELAY_SECONDS,
};
use crate::errors::{ProcwardError, Result};
use crate::types::ProcessKind;

/// Check the write-time invariants of a definition.
pub fn validate_definition(def: &ProcessDefinition) -> Result<()> {
    if def.path.trim().is_empty() {
        return Err(ProcwardError::Validation(format!(
            "process '{}': path must not be empty",
            display_name(def)
        )));
    }
    if def.delay_seconds > MAX_DELAY_SECONDS {
        return Err(ProcwardError::Validation(format!(
            "process '{}': delaySeconds must be between 0 and {} (got {})",
            display_name(def),
            MAX_DELAY_SECONDS,
            def.delay_seconds
        )));
    }
    if def.guard_delay_seconds > MAX_GUARD_DELAY_SECONDS {
        return Err(ProcwardError::Validation(format!(
            "process '{}': guardDelaySeconds must be between 0 and {} (got {})",
            display_name(def),
            MAX_GUARD_DELAY_SECONDS,
            def.guard_delay_seconds
        )));
    }
    Ok(())
}

fn display_name(def: &ProcessDefinition) -> &str {
    if def.name.is_empty() { &def.path } else { &def.name }
}

fn seconds_in_range(field: &str, value: i64, max: u32) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= max)
        .ok_or_else(|| {
            ProcwardError::Validation(format!(
                "{field} must be between 0 and {max} (got {value})"
            ))
        })
}

impl RawProcessDefinition {
    /// Build a full definition, filling unset fields with defaults.
    ///
    /// When `type` is unset it is inferred from the path extension.
    pub fn into_definition(self, id: String) -> Result<ProcessDefinition> {
        let path = self.path.unwrap_or_default();
        let kind = self.kind.unwrap_or_else(|| ProcessKind::from_path(&path));

        let def = ProcessDefinition {
            id,
            name: self.name.unwrap_or_default(),
            kind,
            args: self.args.unwrap_or_default(),
            delay_seconds: seconds_in_range(
                "delaySeconds",
                self.delay_seconds.unwrap_or(0),
                MAX_DELAY_SECONDS,
            )?,
            guard_enabled: self.guard_enabled.unwrap_or(true),
            guard_delay_seconds: seconds_in_range(
                "guardDelaySeconds",
                self.guard_delay_seconds
                    .unwrap_or(i64::from(DEFAULT_GUARD_DELAY_SECONDS)),
                MAX_GUARD_DELAY_SECONDS,
            )?,
            enabled: self.enabled.unwrap_or(true),
            background: self.background.unwrap_or(false),
            path,
        };

        validate_definition(&def)?;
        Ok(def)
    }

    /// Overlay the fields that are set onto `base`. The id of `base` is kept.
    pub fn apply_to(self, base: &ProcessDefinition) -> Result<ProcessDefinition> {
        let mut def = base.clone();

        if let Some(name) = self.name {
            def.name = name;
        }
        if let Some(path) = self.path {
            def.path = path;
        }
        if let Some(kind) = self.kind {
            def.kind = kind;
        }
        if let Some(args) = self.args {
            def.args = args;
        }
        if let Some(delay) = self.delay_seconds {
            def.delay_seconds = seconds_in_range("delaySeconds", delay, MAX_DELAY_SECONDS)?;
        }
        if let Some(guard) = self.guard_enabled {
            def.guard_enabled = guard;
        }
        if let Some(delay) = self.guard_delay_seconds {
            def.guard_delay_seconds =
                seconds_in_range("guardDelaySeconds", delay, MAX_GUARD_DELAY_SECONDS)?;
        }
        if let Some(enabled) = self.enabled {
            def.enabled = enabled;
        }
        if let Some(background) = self.background {
            def.background = background;
        }

        validate_definition(&def)?;
        Ok(def)
    }
}

impl TryFrom<RawProcessDefinition> for ProcessDefinition {
    type Error = ProcwardError;

    fn try_from(mut raw: RawProcessDefinition) -> std::result::Result<Self, Self::Error> {
        let id = raw
            .id
            .take()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_id);
        raw.into_definition(id)
    }
}

impl TryFrom<RawStateFile> for StateFile {
    type Error = ProcwardError;

    fn try_from(raw: RawStateFile) -> std::result::Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        let mut processes = Vec::with_capacity(raw.processes.len());

        for entry in raw.processes {
            let def = ProcessDefinition::try_from(entry)?;
            if !seen.insert(def.id.clone()) {
                return Err(ProcwardError::Validation(format!(
                    "duplicate process id '{}' in state file",
                    def.id
                )));
            }
            processes.push(def);
        }

        Ok(StateFile {
            auto_start_on_open: raw.auto_start_on_open,
            processes,
        })
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ProcwardError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        let section = raw.supervisor;

        if section.kill_grace_ms == 0 {
            return Err(ProcwardError::Config(
                "[supervisor].kill_grace_ms must be >= 1 (got 0)".to_string(),
            ));
        }
        if section.state_file.as_os_str().is_empty() {
            return Err(ProcwardError::Config(
                "[supervisor].state_file must not be empty".to_string(),
            ));
        }

        if section
            .log_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            return Err(ProcwardError::Config(
                "[supervisor].log_dir must not be empty when set".to_string(),
            ));
        }

        Ok(Settings {
            state_file: section.state_file,
            kill_grace: Duration::from_millis(section.kill_grace_ms),
            shutdown_policy: section.shutdown_policy,
            log_dir: section.log_dir,
        })
    }
}
