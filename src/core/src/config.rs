use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compression::CompressionKind;
use crate::error::{Result, VaultError};

/// Default config file name under `~/.image-vault/`.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Image vault configuration
///
/// Built once per invocation and shared read-only with the orchestrator and
/// both pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory archives and sidecars are written to (and listed from)
    pub backup_dir: PathBuf,

    /// Maximum number of items processed concurrently
    pub max_workers: usize,

    /// Emit per-item progress detail
    pub verbose: bool,

    /// Encoding used for new archives
    pub compression: CompressionKind,

    /// Gzip level (0-9)
    pub compression_level: u32,

    /// Container engine binary (docker-CLI compatible)
    pub engine: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("docker-backups"),
            max_workers: 3,
            verbose: false,
            compression: CompressionKind::Gzip,
            compression_level: 6,
            engine: "docker".to_string(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from a YAML file. Missing fields take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            VaultError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: VaultConfig = serde_yaml::from_str(&data).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Resolve configuration: an explicit file must exist, the default file
    /// (~/.image-vault/config.yaml) is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_yaml_file(path);
        }

        let default_path = default_config_path();
        if default_path.exists() {
            tracing::debug!("Loading config from {}", default_path.display());
            Self::from_yaml_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check invariants the pipelines rely on.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(VaultError::ConfigError(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.compression_level > 9 {
            return Err(VaultError::ConfigError(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        if self.engine.trim().is_empty() {
            return Err(VaultError::ConfigError(
                "engine binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the path to the default config file (~/.image-vault/config.yaml).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".image-vault"))
        .unwrap_or_else(|| PathBuf::from(".image-vault"))
        .join(CONFIG_FILE_NAME)
}
