// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Read settings TOML from `path` without semantic validation.
///
/// A missing file is not an error: every setting has a default.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "settings file not found; using defaults");
        return Ok(RawSettings::default());
    }

    let contents = fs::read_to_string(path)?;
    let raw: RawSettings = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load settings from `path` and validate them.
///
/// A relative `log_dir` is taken relative to the settings file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let mut settings = Settings::try_from(raw)?;

    if let Some(dir) = settings.log_dir.take() {
        settings.log_dir = Some(match path.parent() {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir,
        });
    }
    Ok(settings)
}

/// Default settings location: `Procward.toml` in the working directory.
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("Procward.toml")
}
