use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Env {
    Local,
    Dev,
    Prod,
}

impl FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Env::Local),
            "dev" => Ok(Env::Dev),
            "prod" => Ok(Env::Prod),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Dev => write!(f, "dev"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

/// Values that come from the process environment: secrets and hosts.
#[derive(Clone)]
pub struct AppEnv {
    pub env: Env,
    pub postgres_host: String,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_database: String,
    pub tinvest_token: String,
}

impl AppEnv {
    pub fn is_local(&self) -> bool {
        self.env == Env::Local
    }
}

// Secrets stay out of `{:#?}` dumps of the settings.
impl fmt::Debug for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppEnv")
            .field("env", &self.env)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_user", &self.postgres_user)
            .field("postgres_password", &"***")
            .field("postgres_database", &self.postgres_database)
            .field("tinvest_token", &"***")
            .finish()
    }
}
