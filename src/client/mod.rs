//! Typed client for the records API.
//!
//! An [`AuthGate`] holds the observable authentication state and is shared by
//! every [`ApiClient`] clone. [`AuthClient`] moves the gate between states,
//! [`ResourceClient`] speaks the uniform CRUD contract of one entity and
//! [`ResourceList`] keeps a list view consistent with its mutations.
//!
//! ```no_run
//! # async fn demo() -> Result<(), scolaris::client::ClientError> {
//! use scolaris::client::{ApiClient, AuthClient, AuthGate, MemoryTokenStore, RenderContext, ResourceClient};
//! use scolaris::model::Eleve;
//! use std::sync::Arc;
//!
//! let gate = AuthGate::new(Arc::new(MemoryTokenStore::new()), RenderContext::Browser);
//! let api = ApiClient::new("http://localhost:8080", gate)?;
//! AuthClient::new(api.clone()).login("admin@school.test", "secret-pass").await?;
//! let eleves = ResourceClient::<Eleve>::new(api).list(&[("sexe", "F")]).await?;
//! # let _ = eleves;
//! # Ok(())
//! # }
//! ```

mod auth;
mod errors;
mod gate;
mod http;
mod resources;
mod token_store;

pub use auth::AuthClient;
pub use errors::{ClientError, Notice, Severity};
pub use gate::{
    AuthGate, AuthState, GuardOutcome, RenderContext, RouteGuard, DEFAULT_LANDING_ROUTE,
    LOGIN_ROUTE,
};
pub use http::ApiClient;
pub use resources::{bulletin, ResourceClient, ResourceList};
pub use token_store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};
