// src/config/mod.rs

//! Configuration for procward.
//!
//! - `model.rs`: process definitions, global config, the durable state file
//!   layout and the supervisor settings (`Procward.toml`).
//! - `loader.rs`: reading settings from disk.
//! - `validate.rs`: raw → validated conversions and the definition
//!   invariants (non-empty path, delay bounds).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_settings_path, load_and_validate, load_from_path};
pub use model::{
    GlobalConfig, ProcessDefinition, RawProcessDefinition, RawSettings, RawStateFile, Settings,
    StateFile, SupervisorSection,
};
pub use validate::validate_definition;
