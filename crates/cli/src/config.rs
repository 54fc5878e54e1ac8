use anyhow::{Context, Result};
use nodeflow_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub engine: EngineConfig,
}

impl CliConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if !config_path.exists() {
            tracing::debug!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read configuration file")?;
        toml::from_str(&content).context("Failed to parse configuration file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(&dir.path().join("nodeflow.toml")).unwrap();
        assert_eq!(config.engine.result_preview_chars, 200);
        assert_eq!(config.engine.default_tool, "knowledge_tool");
    }

    #[test]
    fn test_partial_engine_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodeflow.toml");
        std::fs::write(&path, "[engine]\nresult_preview_chars = 40\n").unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.engine.result_preview_chars, 40);
        assert_eq!(config.engine.default_tool_param, "query");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodeflow.toml");
        std::fs::write(&path, "[engine\n").unwrap();

        let err = CliConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
