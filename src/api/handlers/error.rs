//! API error taxonomy and its HTTP rendering.

use axum::{
    extract::rejection::JsonRejection,
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{model::FieldErrors, store::StoreError};

pub const CREDENTIALS_FIELD: &str = "credentials";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The given data was invalid.")]
    Validation(FieldErrors),
    /// Unknown email and wrong password render identically.
    #[error("These credentials do not match our records.")]
    InvalidCredentials,
    #[error("Unauthenticated.")]
    Unauthenticated,
    #[error("Resource not found.")]
    NotFound,
    #[error("The request conflicts with existing data.")]
    Conflict(String),
    #[error("Server error.")]
    Internal(#[from] anyhow::Error),
}

/// JSON error body: a summary plus optional field-keyed messages.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl ApiError {
    #[must_use]
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCredentials => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let errors = match self {
            Self::Validation(errors) => Some(errors),
            Self::InvalidCredentials => Some(FieldErrors::single(CREDENTIALS_FIELD, message.clone())),
            Self::Conflict(detail) => {
                debug!(detail = %detail, "request rejected by a constraint");
                None
            }
            Self::Internal(err) => {
                error!("request failed: {err:#}");
                None
            }
            Self::Unauthenticated | Self::NotFound => None,
        };

        let mut response = (status, Json(ErrorBody { message, errors })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Invalid(detail) => Self::field("payload", detail),
            StoreError::Other(err) => Self::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::field("payload", rejection.body_text())
    }
}
