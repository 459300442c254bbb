//! Session endpoints: login, logout and the current session.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    password,
    principal::Principal,
    state::AuthState,
    storage,
    types::{LoginRequest, LoginResponse, MessageResponse, SessionResponse},
    utils::normalize_email,
};
use crate::{
    api::handlers::error::{ApiError, ErrorBody},
    model::{valid_email, FieldErrors},
};

pub const TOKEN_TYPE: &str = "Bearer";

#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, token issued", body = LoginResponse),
        (status = 422, description = "Missing fields or credentials rejected", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let email = validate_login(&request)?;

    let record = auth_state.users().find_by_email(&email).await?;
    let (phc, user) = match record {
        Some(record) => (record.password_hash, Some(record.user)),
        None => (auth_state.dummy_hash().to_string(), None),
    };

    // Argon2 is CPU bound; keep it off the async workers.
    let secret = request.password;
    let matches = tokio::task::spawn_blocking(move || {
        password::verify_password(secret.expose_secret(), &phc)
    })
    .await
    .context("password verification task failed")?;

    let Some(user) = user.filter(|_| matches) else {
        info!("login rejected");
        return Err(ApiError::InvalidCredentials);
    };

    let access_token = storage::issue(&auth_state, &user).await?;
    info!(user_id = %user.id, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
        user,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Presented token revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    principal: Principal,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    storage::revoke(&auth_state, &principal.token_hash).await?;
    info!(user_id = %principal.user.id, "logout");
    Ok(Json(MessageResponse {
        message: "Logged out.".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn current(principal: Principal) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: principal.user,
    })
}

/// Field checks that run before any lookup. Returns the normalized email.
fn validate_login(request: &LoginRequest) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    let email = normalize_email(&request.email);
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if !valid_email(&email) {
        errors.add("email", "The email field must be a valid email address.");
    }
    if request.password.expose_secret().is_empty() {
        errors.add("password", "The password field is required.");
    }
    errors.into_result().map_err(ApiError::Validation)?;
    Ok(email)
}
