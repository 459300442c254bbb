use crate::{
    api::{self, handlers::auth::AuthConfig},
    store::{schema, Stores},
};
use anyhow::{anyhow, Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub apply_schema: bool,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub password_memory_kib: u32,
    pub password_iterations: u32,
    pub password_parallelism: u32,
}

impl Args {
    fn auth_config(&self) -> Result<AuthConfig> {
        let params = argon2::Params::new(
            self.password_memory_kib,
            self.password_iterations,
            self.password_parallelism,
            None,
        )
        .map_err(|err| anyhow!("Invalid Argon2 parameters: {err}"))?;

        Ok(AuthConfig::new(self.frontend_base_url.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)?
            .with_password_params(params))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config()?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(args.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    debug!("database pool ready");

    if args.apply_schema {
        schema::apply(&pool).await?;
    }

    api::new(args.port, Stores::postgres(pool), auth_config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/scolaris".to_string(),
            db_max_connections: 5,
            apply_schema: false,
            frontend_base_url: "http://localhost:4200".to_string(),
            session_ttl_seconds: 43200,
            password_memory_kib: 19456,
            password_iterations: 2,
            password_parallelism: 1,
        }
    }

    #[test]
    fn auth_config_from_args() -> Result<()> {
        let config = args().auth_config()?;
        assert_eq!(config.frontend_base_url(), "http://localhost:4200");
        assert_eq!(config.session_ttl_seconds(), 43200);
        assert_eq!(config.password_params().m_cost(), 19456);
        Ok(())
    }

    #[test]
    fn auth_config_rejects_impossible_argon2_cost() {
        let mut args = args();
        args.password_memory_kib = 1;
        assert!(args.auth_config().is_err());
    }

    #[test]
    fn auth_config_rejects_unbounded_session_ttl() {
        let mut args = args();
        args.session_ttl_seconds = 100_000_000_000_000;
        assert!(args.auth_config().is_err());
    }
}
