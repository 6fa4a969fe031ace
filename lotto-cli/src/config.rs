use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "lotto-cli.json";

/// Per-user CLI settings kept next to the lottery database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    pub default_account: Option<String>,
}

impl CliConfig {
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lotto")
    }

    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE_NAME)
    }

    /// Missing file means defaults.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid CLI config {}", path.display()))
    }

    pub fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        let path = Self::path(data_dir);
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_round_trip() {
        let temp_dir = tempdir().unwrap();
        assert!(CliConfig::load(temp_dir.path()).unwrap().default_account.is_none());

        let config = CliConfig {
            default_account: Some("alice".to_string()),
        };
        config.save(temp_dir.path()).unwrap();

        let loaded = CliConfig::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.default_account.as_deref(), Some("alice"));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "not json").unwrap();
        assert!(CliConfig::load(temp_dir.path()).is_err());
    }
}
