//! Account registration.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    password,
    state::AuthState,
    types::RegisterRequest,
    utils::{normalize_email, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH},
};
use crate::{
    api::handlers::error::{ApiError, ErrorBody},
    model::{valid_email, FieldErrors, Role, User},
    store::{NewUser, StoreError},
};

#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 422, description = "Invalid fields or email already taken", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip(auth_state, payload))]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(request) = payload?;
    let email = validate_registration(&request)?;

    let params = auth_state.config().password_params().clone();
    let secret = request.password;
    let password_hash = tokio::task::spawn_blocking(move || {
        password::hash_password(secret.expose_secret(), &params)
    })
    .await
    .context("password hashing task failed")??;

    let new_user = NewUser {
        name: request.name.trim().to_string(),
        email,
        password_hash,
        // Self-registration never grants a privileged role.
        role: Role::default(),
    };

    match auth_state.users().insert_user(new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, role = %user.role, "user registered");
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(StoreError::Conflict(_)) => Err(ApiError::field(
            "email",
            "The email has already been taken.",
        )),
        Err(err) => Err(err.into()),
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    if request.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    }
    let email = normalize_email(&request.email);
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if !valid_email(&email) {
        errors.add("email", "The email field must be a valid email address.");
    }
    let length = request.password.expose_secret().chars().count();
    if length == 0 {
        errors.add("password", "The password field is required.");
    } else if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        errors.add(
            "password",
            format!(
                "The password field must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters."
            ),
        );
    }
    errors.into_result().map_err(ApiError::Validation)?;
    Ok(email)
}
