//! Authenticated principal extraction.
//!
//! Flow Overview: read the bearer token, resolve its hash to a user, and hand
//! the principal to the handler. Anything else is a `401`.

use anyhow::anyhow;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::{
    state::AuthState,
    storage,
    utils::{extract_bearer_token, hash_session_token},
};
use crate::{api::handlers::error::ApiError, model::User};

/// Authenticated user plus the hash of the token that authenticated it.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: User,
    pub(super) token_hash: Vec<u8>,
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal(anyhow!("auth state is not configured")))?;
        let token = extract_bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;
        let user = storage::lookup(&auth_state, &token)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        Ok(Self {
            user,
            token_hash: hash_session_token(&token),
        })
    }
}
