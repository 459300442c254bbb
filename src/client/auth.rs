//! Login, logout, registration and session resolution.

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, warn};

use super::{errors::ClientError, gate::AuthState, http::ApiClient};
use crate::{
    api::handlers::{
        auth::types::{LoginResponse, MessageResponse, SessionResponse},
        error::CREDENTIALS_FIELD,
    },
    model::{valid_email, FieldErrors, User},
};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Clone, Debug)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Exchange credentials for a bearer token and publish the new session.
    ///
    /// # Errors
    /// `Validation` for missing fields, `Authentication` when the server
    /// rejects the credentials, or a transport error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let mut errors = FieldErrors::new();
        if email.trim().is_empty() {
            errors.add("email", "The email field is required.");
        } else if !valid_email(email.trim()) {
            errors.add("email", "The email field must be a valid email address.");
        }
        if password.is_empty() {
            errors.add("password", "The password field is required.");
        }
        errors.into_result().map_err(ClientError::validation)?;

        let request = self
            .api
            .request(Method::POST, "/api/sessions")
            .json(&Credentials { email, password });

        let response = match self.api.json::<LoginResponse>(request).await {
            Err(ClientError::Validation { message, errors })
                if errors.contains(CREDENTIALS_FIELD) =>
            {
                return Err(ClientError::Authentication(message));
            }
            other => other?,
        };

        debug!(user = %response.user.id, "signed in");
        self.api
            .gate()
            .sign_in(response.access_token, response.user.clone())
            .await;
        Ok(response.user)
    }

    /// Revoke the current token. The local session ends even when the
    /// server cannot be reached.
    ///
    /// # Errors
    /// Returns the transport error, after signing out locally.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.api.gate().token().is_none() {
            self.api.gate().sign_out().await;
            return Ok(());
        }

        let request = self.api.request(Method::DELETE, "/api/sessions");
        let result = self.api.json::<MessageResponse>(request).await;
        self.api.gate().sign_out().await;

        match result {
            Ok(_) | Err(ClientError::Authentication(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Create an account with the default role. Does not sign in.
    ///
    /// # Errors
    /// `Validation` when a field is rejected, or a transport error.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ClientError> {
        let mut errors = FieldErrors::new();
        if name.trim().is_empty() {
            errors.add("name", "The name field is required.");
        }
        if email.trim().is_empty() {
            errors.add("email", "The email field is required.");
        }
        if password.is_empty() {
            errors.add("password", "The password field is required.");
        }
        errors.into_result().map_err(ClientError::validation)?;

        let request = self.api.request(Method::POST, "/api/register").json(&Registration {
            name,
            email,
            password,
        });
        self.api.json(request).await
    }

    /// Hydrate the gate from the token store, then confirm the session with
    /// the server. Offline, the stored session is kept.
    pub async fn resolve_session(&self) -> AuthState {
        let state = self.api.gate().hydrate().await;
        if !state.is_authenticated() {
            return state;
        }

        let request = self.api.request(Method::GET, "/api/sessions");
        match self.api.json::<SessionResponse>(request).await {
            Ok(SessionResponse { user }) => self.api.gate().update_user(user).await,
            // The transport already signed out on 401.
            Err(ClientError::Authentication(_)) => {}
            Err(err) => warn!("Could not confirm stored session: {err}"),
        }
        self.api.gate().current()
    }
}
