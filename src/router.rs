// src/router.rs

//! Dispatch of inbound commands to the registry and the engine.
//!
//! Every rejected command produces exactly one `commandFailed` event.
//! Mutations of the definition list are followed by a fresh
//! `processListResponse`, also when only the durable write failed (the
//! in-memory change stands in that case).

use tracing::{debug, warn};

use crate::config::ProcessDefinition;
use crate::engine::{Notifier, SupervisorEngine};
use crate::errors::{ProcwardError, Result};
use crate::protocol::{Command, Event};

#[derive(Debug, Clone)]
pub struct Router {
    engine: SupervisorEngine,
    notifier: Notifier,
}

impl Router {
    pub fn new(engine: SupervisorEngine) -> Self {
        let notifier = engine.notifier().clone();
        Self { engine, notifier }
    }

    pub fn engine(&self) -> &SupervisorEngine {
        &self.engine
    }

    /// Handle one command; outcomes are reported through the notifier.
    pub async fn dispatch(&self, command: Command) {
        let action = command.action();
        let target = command.target().map(str::to_string);
        debug!(action, id = ?target, "dispatching command");

        let mutates_list = matches!(
            command,
            Command::AddProcess { .. } | Command::UpdateProcess { .. } | Command::DeleteProcess { .. }
        );

        let result = self.execute(command).await;

        if let Err(err) = &result {
            warn!(action, id = ?target, error = %err, "command failed");
            self.notifier
                .publish(Event::command_failed(action, target, err));
        }

        if mutates_list && matches!(result, Ok(()) | Err(ProcwardError::Persistence(_))) {
            self.publish_list().await;
        }
    }

    /// Report a line that could not be parsed into a command.
    pub fn reject(&self, action: &str, err: &ProcwardError) {
        warn!(action, error = %err, "rejected malformed command");
        self.notifier
            .publish(Event::command_failed(action, None, err));
    }

    async fn execute(&self, command: Command) -> Result<()> {
        let registry = self.engine.registry();

        match command {
            Command::GetProcessList => {
                self.publish_list().await;
                Ok(())
            }
            Command::StartAll => {
                self.engine.start_all();
                Ok(())
            }
            Command::StopAll => {
                self.engine.stop_all();
                Ok(())
            }
            Command::StartProcess { id } => self.engine.start(&id),
            Command::StopProcess { id } => self.engine.stop(&id),
            Command::AddProcess { process } => {
                let def = ProcessDefinition::try_from(process)?;
                registry.add(def).map(|_| ())
            }
            Command::UpdateProcess { process } => {
                let id = process
                    .id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        ProcwardError::Validation("updateProcess requires an id".to_string())
                    })?;
                let current = registry.get(&id)?;
                let updated = process.apply_to(&current)?;
                registry.update(updated)
            }
            Command::DeleteProcess { id } => self.engine.delete(&id).await.map(|_| ()),
            Command::GetConfig => {
                self.publish_config();
                Ok(())
            }
            Command::SaveConfig { config } => {
                let saved = registry.set_global_config(config);
                if matches!(saved, Ok(()) | Err(ProcwardError::Persistence(_))) {
                    self.publish_config();
                }
                saved
            }
            Command::OpenFilePicker => Err(ProcwardError::Unsupported(
                "openFilePicker is handled by the host".to_string(),
            )),
        }
    }

    async fn publish_list(&self) {
        let processes = self.engine.list().await;
        self.notifier
            .publish(Event::ProcessListResponse { processes });
    }

    fn publish_config(&self) {
        let config = self.engine.registry().global_config();
        self.notifier.publish(Event::ConfigResponse {
            auto_start_on_open: config.auto_start_on_open,
        });
    }
}
