use std::path::{Path, PathBuf};

use newswatch_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

/// Environment variables that override file-based configuration. Secrets are
/// commonly injected this way instead of being written to config.yml.
const ENV_LLM_API_KEY: &str = "NEWSWATCH_LLM_API_KEY";
const ENV_SEARCH_API_KEY: &str = "NEWSWATCH_SEARCH_API_KEY";
const ENV_EMAIL_FROM: &str = "NEWSWATCH_EMAIL_FROM_ADDRESS";
const ENV_EMAIL_PASSWORD: &str = "NEWSWATCH_EMAIL_PASSWORD";
const ENV_LOG_LEVEL: &str = "NEWSWATCH_LOG_LEVEL";

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
        }
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".newswatch"));
        let xdg_config = dirs::config_dir().map(|c| c.join("newswatch"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                if xdg.exists() {
                    xdg
                } else if home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".newswatch"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Create the config and data directories if they do not exist yet.
    pub fn ensure_dirs(&self, config: &AppConfig) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(self.data_dir(config))?;
        Ok(())
    }

    pub fn load(&self) -> Result<AppConfig> {
        // Pick up a local .env before reading overrides.
        dotenvy::dotenv().ok();

        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        let mut config = if yaml_path.exists() {
            info!("loading config from {}", yaml_path.display());
            let contents = std::fs::read_to_string(&yaml_path)?;
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?
        } else if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))?
        } else {
            info!("no config file found, using defaults");
            AppConfig::default()
        };

        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Resolved data directory: explicit `data_dir` from config, or `data/`
    /// under the config directory.
    pub fn data_dir(&self, config: &AppConfig) -> PathBuf {
        config
            .data_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("data"))
    }

    pub fn database_path(&self, config: &AppConfig) -> PathBuf {
        self.data_dir(config).join("newswatch.db")
    }

    pub fn memory_path(&self, config: &AppConfig) -> PathBuf {
        self.data_dir(config).join("memory.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment variables win over file values.
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(key) = std::env::var(ENV_LLM_API_KEY) {
        config.llm.api_key = Some(key);
    }
    if let Ok(key) = std::env::var(ENV_SEARCH_API_KEY) {
        config.search.api_key = Some(key);
    }
    if let Ok(from) = std::env::var(ENV_EMAIL_FROM) {
        config.email.from_address = from;
    }
    if let Ok(password) = std::env::var(ENV_EMAIL_PASSWORD) {
        config.email.password = password;
    }
    if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
        config.log_level = Some(level);
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;

    #[test]
    fn loads_defaults_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.llm.provider, "deepseek");
    }

    #[test]
    fn loads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yml"),
            "search:\n  provider: brave\n  max_results: 5\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn loads_toml_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[scheduler]\ndefault_interval_hours = 12\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(config.scheduler.default_interval_hours, 12);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yml"), "llm: [not, a, map").unwrap();

        let loader = ConfigLoader::with_dir(dir.path());
        assert!(loader.load().is_err());
    }

    #[test]
    fn data_dir_defaults_under_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_dir(dir.path());
        let config = loader.load().unwrap();
        assert_eq!(loader.data_dir(&config), dir.path().join("data"));
        assert_eq!(
            loader.database_path(&config),
            dir.path().join("data").join("newswatch.db")
        );
    }
}
