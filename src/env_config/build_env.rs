use super::models::app_env::{AppEnv, Env};
use crate::env_config::build_config::ConfigError;
use std::env;
use std::str::FromStr;

impl AppEnv {
    pub fn new() -> Result<AppEnv, ConfigError> {
        Ok(AppEnv {
            env: Env::from_str(&get_env_var("ENV")?).map_err(ConfigError::Invalid)?,
            postgres_host: get_env_var("POSTGRES_HOST")?,
            postgres_user: get_env_var("POSTGRES_USER")?,
            postgres_password: get_env_var("POSTGRES_PASSWORD")?,
            postgres_database: get_env_var("POSTGRES_DATABASE")?,
            tinvest_token: get_env_var("TINVEST_TOKEN")?,
        })
    }
}

fn get_env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))
}
