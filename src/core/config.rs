//! Project configuration loaded from `.signoff/config.toml`.
//!
//! Defaults are resolved once at load; callers never re-check for absent
//! fields downstream.

use crate::core::error::SignoffError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Actor recorded when a command does not pass `--actor`.
    #[serde(default = "default_actor")]
    pub default_actor: String,
    /// External command used to evaluate CUSTOM_CRON schedules. Invoked as
    /// `<command> <expression> <date>`; exit code 0 means "due". When unset,
    /// cron schedules evaluate to not-due.
    #[serde(default)]
    pub cron_evaluator: Option<String>,
}

fn default_actor() -> String {
    "operator".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_actor: default_actor(),
            cron_evaluator: None,
        }
    }
}

/// Load config from `<signoff_root>/config.toml`, falling back to defaults
/// when the file is missing.
pub fn load_config(signoff_root: &Path) -> Result<Config, SignoffError> {
    let path = signoff_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(&path).map_err(SignoffError::IoError)?;
    toml::from_str(&raw)
        .map_err(|e| SignoffError::ValidationError(format!("Invalid config.toml: {e}")))
}

/// Write the default config during `signoff init`. Existing files are left
/// untouched.
pub fn write_default_config(signoff_root: &Path) -> Result<(), SignoffError> {
    let path = signoff_root.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(());
    }
    let rendered = toml::to_string_pretty(&Config::default())
        .map_err(|e| SignoffError::ValidationError(format!("Unable to render config: {e}")))?;
    fs::write(path, rendered).map_err(SignoffError::IoError)?;
    Ok(())
}
