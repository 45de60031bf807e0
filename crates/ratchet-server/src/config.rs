//! Server configuration, deserialised from `config.toml` and `RATCHET_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use ratchet_core::config::{LearningConfig, PropagationConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                      String,
  pub port:                      u16,
  pub store_path:                PathBuf,
  /// Seconds between scheduled mining passes; 0 disables the timer.
  pub mining_interval_secs:      u64,
  /// Seconds between scheduled propagation cycles; 0 disables the timer.
  pub propagation_interval_secs: u64,
  /// Mine after this many completed executions; 0 disables.
  pub mine_every_executions:     u64,
  /// How long a crashed run keeps its lease.
  pub lease_ttl_secs:            i64,
  pub learning:                  LearningConfig,
  pub propagation:               PropagationConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                      "127.0.0.1".into(),
      port:                      7878,
      store_path:                PathBuf::from("~/.local/share/ratchet/ratchet.db"),
      mining_interval_secs:      3600,
      propagation_interval_secs: 86_400,
      mine_every_executions:     100,
      lease_ttl_secs:            1800,
      learning:                  LearningConfig::default(),
      propagation:               PropagationConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer `path` (optional) and the environment over the defaults.
  ///
  /// Nested keys use `__`, e.g. `RATCHET_LEARNING__PATTERN_THRESHOLD=3`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("RATCHET")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn mining_interval(&self) -> Option<Duration> {
    non_zero_secs(self.mining_interval_secs)
  }

  pub fn propagation_interval(&self) -> Option<Duration> {
    non_zero_secs(self.propagation_interval_secs)
  }

  pub fn lease_ttl(&self) -> chrono::Duration { chrono::Duration::seconds(self.lease_ttl_secs) }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
  (secs > 0).then(|| Duration::from_secs(secs))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
