//! Configuration file support for fitcrew.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/fitcrew/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub equipment: EquipmentConfig,

    #[serde(default)]
    pub data: DataConfig,
}

/// Pipeline timing and fallback configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// End-to-end budget for one `generate` call
    #[serde(default = "default_total_timeout_ms")]
    pub total_timeout_ms: u64,

    /// Budget for a single collaborator call
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    /// Extra attempts after a collaborator timeout
    #[serde(default)]
    pub collaborator_retries: u32,

    /// Fill empty phases from the built-in bodyweight library
    #[serde(default = "default_use_builtin_library")]
    pub use_builtin_library: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            total_timeout_ms: default_total_timeout_ms(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            collaborator_retries: 0,
            use_builtin_library: default_use_builtin_library(),
        }
    }
}

impl GenerationConfig {
    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

/// Equipment assumed when a request does not list any
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct EquipmentConfig {
    #[serde(default)]
    pub available: Vec<String>,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// JSONL log of saved workouts
    pub fn workouts_path(&self) -> PathBuf {
        self.data_dir.join("workouts.jsonl")
    }
}

// Default value functions
fn default_total_timeout_ms() -> u64 {
    30_000
}

fn default_collaborator_timeout_ms() -> u64 {
    12_000
}

fn default_use_builtin_library() -> bool {
    true
}

fn home_dir_or_cwd() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir_or_cwd().join(".local/share"));
    base.join("fitcrew")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_cwd().join(".config"));
        base.join("fitcrew").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject budgets the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.total_timeout_ms == 0 {
            return Err(Error::Config("total_timeout_ms must be positive".into()));
        }
        if generation.collaborator_timeout_ms == 0 {
            return Err(Error::Config(
                "collaborator_timeout_ms must be positive".into(),
            ));
        }
        if generation.collaborator_timeout_ms > generation.total_timeout_ms {
            return Err(Error::Config(format!(
                "collaborator_timeout_ms ({}) exceeds total_timeout_ms ({})",
                generation.collaborator_timeout_ms, generation.total_timeout_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.total_timeout_ms, 30_000);
        assert_eq!(config.generation.collaborator_timeout_ms, 12_000);
        assert_eq!(config.generation.collaborator_retries, 0);
        assert!(config.generation.use_builtin_library);
        assert!(config.equipment.available.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.equipment.available = vec!["dumbbells".into()];
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[generation]
collaborator_timeout_ms = 5000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.generation.collaborator_timeout_ms, 5000);
        assert_eq!(config.generation.total_timeout_ms, 30_000); // default
        assert!(config.generation.use_builtin_library);
    }

    #[test]
    fn test_validate_rejects_inverted_budgets() {
        let mut config = Config::default();
        config.generation.collaborator_timeout_ms = 60_000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.generation.collaborator_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.generation.collaborator_retries = 2;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.generation.collaborator_retries, 2);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[generation]\ntotal_timeout_ms = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
