use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::api::handlers::auth::MAX_SESSION_TTL_SECONDS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub password_memory_kib: u32,
    pub password_iterations: u32,
    pub password_parallelism: u32,
}

impl Options {
    /// Read the auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing argument: --frontend-base-url")?,
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .context("missing argument: --session-ttl-seconds")?,
            password_memory_kib: matches
                .get_one::<u32>("password-memory-kib")
                .copied()
                .context("missing argument: --password-memory-kib")?,
            password_iterations: matches
                .get_one::<u32>("password-iterations")
                .copied()
                .context("missing argument: --password-iterations")?,
            password_parallelism: matches
                .get_one::<u32>("password-parallelism")
                .copied()
                .context("missing argument: --password-parallelism")?,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_password_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL, the only origin allowed by CORS")
                .env("SCOLARIS_FRONTEND_BASE_URL")
                .default_value("http://localhost:4200"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Bearer token lifetime in seconds, 0 disables expiry")
                .env("SCOLARIS_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(0..=MAX_SESSION_TTL_SECONDS)),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("password-memory-kib")
                .long("password-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("SCOLARIS_PASSWORD_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("password-iterations")
                .long("password-iterations")
                .help("Argon2id iteration count")
                .env("SCOLARIS_PASSWORD_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("password-parallelism")
                .long("password-parallelism")
                .help("Argon2id lanes")
                .env("SCOLARIS_PASSWORD_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
