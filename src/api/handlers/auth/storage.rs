//! Session issue, lookup and revocation on top of the session store.

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, warn};

use super::{
    state::AuthState,
    utils::{generate_session_token, hash_session_token},
};
use crate::{
    api::handlers::error::ApiError,
    model::User,
    store::StoreError,
};

const ISSUE_ATTEMPTS: usize = 3;

/// Mint a token for `user` and persist its hash. Returns the raw token, which
/// is never stored.
pub(super) async fn issue(auth_state: &AuthState, user: &User) -> Result<String, ApiError> {
    let expires_at = auth_state.config().session_expires_at(Utc::now())?;
    for attempt in 1..=ISSUE_ATTEMPTS {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        match auth_state
            .sessions()
            .insert_session(user.id, &token_hash, expires_at)
            .await
        {
            Ok(()) => {
                debug!(user_id = %user.id, "session issued");
                return Ok(token);
            }
            Err(StoreError::Conflict(_)) => {
                warn!(attempt, "session token collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(ApiError::Internal(anyhow!(
        "failed to issue a unique session token after {ISSUE_ATTEMPTS} attempts"
    )))
}

/// Resolve a raw token to its owner.
pub(super) async fn lookup(auth_state: &AuthState, token: &str) -> Result<Option<User>, ApiError> {
    let token_hash = hash_session_token(token);
    Ok(auth_state.sessions().lookup_session(&token_hash).await?)
}

/// Delete the session of this token hash only. A missing row is not an error.
pub(super) async fn revoke(auth_state: &AuthState, token_hash: &[u8]) -> Result<(), ApiError> {
    let deleted = auth_state.sessions().delete_session(token_hash).await?;
    if !deleted {
        debug!("session already revoked");
    }
    Ok(())
}
