//! Loading app configuration (session defaults + optional task bank) from TOML.
//!
//! Example:
//! ```toml
//! [session]
//! mode = "blind"
//! aids = { fingers = false }
//!
//! [[tasks]]
//! difficulty = "tier20"
//! operand1 = 8
//! operand2 = 3
//! operator = "add"
//! declared_result = 11
//! unknown_slot = "operand2"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::TaskFactIn;
use crate::error::ConfigError;
use crate::policy::AidConfig;
use crate::session::TrainingMode;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub session: SessionDefaults,
  #[serde(default)]
  pub tasks: Vec<TaskCfg>,
}

/// Defaults applied to every new WebSocket session until it sends `start`.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct SessionDefaults {
  #[serde(default)]
  pub mode: TrainingMode,
  #[serde(default)]
  pub aids: AidConfig,
}

/// Task-bank entry. The difficulty is free-form; the built-in seeds use the
/// range tier labels (`tier20`, `tier100`, ...).
#[derive(Clone, Debug, Deserialize)]
pub struct TaskCfg {
  pub difficulty: String,
  #[serde(flatten)]
  pub task: TaskFactIn,
}

pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
  toml::from_str::<AppConfig>(&s).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = PathBuf::from(std::env::var("APP_CONFIG_PATH").ok()?);
  match load_from_path(&path) {
    Ok(cfg) => {
      info!(target: "mathtrainer_backend", path = %path.display(), tasks = cfg.tasks.len(), "Loaded app config (TOML)");
      Some(cfg)
    }
    Err(e) => {
      error!(target: "mathtrainer_backend", error = %e, "Failed to load TOML config; using defaults");
      None
    }
  }
}
