//! Map parsed CLI arguments to the action that runs them.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, database};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let database_opts = database::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: database_opts.dsn,
        db_max_connections: database_opts.max_connections,
        apply_schema: database_opts.apply_schema,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        password_memory_kib: auth_opts.password_memory_kib,
        password_iterations: auth_opts.password_iterations,
        password_parallelism: auth_opts.password_parallelism,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn server_action_carries_parsed_arguments() -> Result<()> {
        temp_env::with_vars(
            [
                (
                    "SCOLARIS_DSN",
                    Some("postgres://user@localhost:5432/scolaris"),
                ),
                ("SCOLARIS_PORT", Some("8443")),
                ("SCOLARIS_SESSION_TTL_SECONDS", Some("3600")),
                ("SCOLARIS_FRONTEND_BASE_URL", None),
                ("SCOLARIS_APPLY_SCHEMA", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec!["scolaris"]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8443);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/scolaris");
                assert_eq!(args.session_ttl_seconds, 3600);
                assert_eq!(args.frontend_base_url, "http://localhost:4200");
                assert_eq!(args.db_max_connections, 5);
                assert!(!args.apply_schema);
                Ok(())
            },
        )
    }
}
