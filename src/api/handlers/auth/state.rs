//! Auth state and configuration.

use anyhow::{anyhow, ensure, Result};
use argon2::Params;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use super::password;
use crate::store::{SessionStore, Stores, UserStore};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
/// Ten years.
pub const MAX_SESSION_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:4200";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    password_params: Params,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            password_params: Params::default(),
        }
    }

    /// `0` disables expiry.
    ///
    /// # Errors
    /// Returns an error if `seconds` is negative or above
    /// [`MAX_SESSION_TTL_SECONDS`].
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Result<Self> {
        ensure!(
            (0..=MAX_SESSION_TTL_SECONDS).contains(&seconds),
            "session TTL must be between 0 and {MAX_SESSION_TTL_SECONDS} seconds, got {seconds}"
        );
        self.session_ttl_seconds = seconds;
        Ok(self)
    }

    /// Argon2 cost used for new password hashes. Existing hashes keep the
    /// parameters encoded in their PHC string.
    #[must_use]
    pub fn with_password_params(mut self, params: Params) -> Self {
        self.password_params = params;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn password_params(&self) -> &Params {
        &self.password_params
    }

    /// Expiry for a session issued at `now`, `None` when sessions never expire.
    ///
    /// # Errors
    /// Returns an error if the expiry is not a representable date.
    pub fn session_expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        if self.session_ttl_seconds == 0 {
            return Ok(None);
        }
        TimeDelta::try_seconds(self.session_ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(Some)
            .ok_or_else(|| {
                anyhow!(
                    "session expiry overflows: {}s after {now}",
                    self.session_ttl_seconds
                )
            })
    }
}

pub struct AuthState {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    dummy_hash: String,
}

impl AuthState {
    /// # Errors
    /// Returns an error if the placeholder password hash cannot be computed.
    pub fn new(config: AuthConfig, stores: &Stores) -> Result<Self> {
        let dummy_hash = password::dummy_hash(config.password_params())?;
        Ok(Self {
            config,
            users: stores.users.clone(),
            sessions: stores.sessions.clone(),
            dummy_hash,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub(super) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Hash verified when the email is unknown.
    pub(super) fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_follows_ttl() -> Result<()> {
        let now = Utc::now();
        let config = AuthConfig::default().with_session_ttl_seconds(60)?;
        assert_eq!(config.session_expires_at(now)?, Some(now + TimeDelta::seconds(60)));

        let forever = AuthConfig::default().with_session_ttl_seconds(0)?;
        assert_eq!(forever.session_expires_at(now)?, None);

        let longest = AuthConfig::default().with_session_ttl_seconds(MAX_SESSION_TTL_SECONDS)?;
        assert!(longest.session_expires_at(now)?.is_some_and(|at| at > now));
        Ok(())
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        for seconds in [-1, MAX_SESSION_TTL_SECONDS + 1, 100_000_000_000_000, i64::MAX] {
            let result = AuthConfig::default().with_session_ttl_seconds(seconds);
            assert!(result.is_err(), "{seconds}");
        }
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() -> Result<()> {
        let config = AuthConfig::default().with_session_ttl_seconds(MAX_SESSION_TTL_SECONDS)?;
        assert!(config.session_expires_at(DateTime::<Utc>::MAX_UTC).is_err());
        Ok(())
    }

    #[test]
    fn default_config_targets_local_frontend() {
        let config = AuthConfig::default();
        assert_eq!(config.frontend_base_url(), "http://localhost:4200");
        assert_eq!(config.session_ttl_seconds(), 43_200);
    }
}
