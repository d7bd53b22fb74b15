use crate::env_config::models::app_setting::AppSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const APPLICATION_NAME: &str = "market-loader";

#[derive(Clone)]
pub struct PostgresConnection {
    pool: Pool<Postgres>,
}

impl PostgresConnection {
    pub async fn new(settings: Arc<AppSettings>) -> Result<Self, sqlx::Error> {
        let env = &settings.app_env;
        let config = &settings.app_config.postgres;
        info!(
            "Connecting to PostgreSQL {}/{}",
            env.postgres_host, env.postgres_database
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .acquire_timeout(Duration::from_secs(config.timeout))
            .connect_with(connect_options(
                &env.postgres_host,
                &env.postgres_user,
                &env.postgres_password,
                &env.postgres_database,
            ))
            .await?;

        debug!("Executing test query on PostgreSQL");
        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            error!("PostgreSQL test query failed: {}", e);
            return Err(e);
        }

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// `host` is either `name` or `name:port`.
fn connect_options(host: &str, user: &str, password: &str, database: &str) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .username(user)
        .password(password)
        .database(database)
        .application_name(APPLICATION_NAME);

    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => options.host(name).port(port),
            Err(_) => options.host(host),
        },
        None => options.host(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_with_port() {
        let options = connect_options("db.internal:6432", "loader", "secret", "market");
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("market"));
    }

    #[test]
    fn test_host_without_port_keeps_default() {
        let options = connect_options("localhost", "loader", "secret", "market");
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
    }
}
