use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub dsn: String,
    pub max_connections: u32,
    pub apply_schema: bool,
}

impl Options {
    /// Read the database options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if `--dsn` is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            dsn: matches
                .get_one::<String>("dsn")
                .cloned()
                .context("missing required argument: --dsn")?,
            max_connections: matches
                .get_one::<u32>("db-max-connections")
                .copied()
                .unwrap_or(5),
            apply_schema: matches.get_flag("apply-schema"),
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("SCOLARIS_DSN")
                .required(true),
        )
        .arg(
            Arg::new("db-max-connections")
                .long("db-max-connections")
                .help("Maximum number of pooled database connections")
                .env("SCOLARIS_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("apply-schema")
                .long("apply-schema")
                .help("Create missing tables and indexes before serving")
                .env("SCOLARIS_APPLY_SCHEMA")
                .action(ArgAction::SetTrue),
        )
}
