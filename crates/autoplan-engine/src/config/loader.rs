use super::schema::EngineConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./autoplan.yaml
    /// 2. ~/.autoplan/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<EngineConfig, ConfigError> {
        let local_config = PathBuf::from("./autoplan.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".autoplan").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(EngineConfig::default().with_env_overrides())
    }

    pub async fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }
}

impl EngineConfig {
    /// `CHROME_BIN` and `AUTOPLAN_USER_DATA_DIR` take precedence over file settings.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(bin) = std::env::var("CHROME_BIN")
            && !bin.trim().is_empty()
        {
            self.browser.executable = Some(PathBuf::from(bin));
        }
        if let Ok(dir) = std::env::var("AUTOPLAN_USER_DATA_DIR")
            && !dir.trim().is_empty()
        {
            self.browser.user_data_dir = Some(PathBuf::from(dir));
        }
        self
    }
}
