use super::models::app_config::AppConfig;
use super::models::app_env::Env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ENV -> {0} is not set")]
    MissingEnv(String),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Loads `config/{env}.toml` relative to the working directory.
    pub fn new(env: &Env) -> Result<AppConfig, ConfigError> {
        let path = PathBuf::from("config").join(format!("{}.toml", env));
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.loading
            .history_start(chrono::Utc::now())
            .map_err(ConfigError::Invalid)?;
        if self.archive.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "archive.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.loading.limits.values().any(|limit| *limit == 0) {
            return Err(ConfigError::Invalid(
                "loading.limits entries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
