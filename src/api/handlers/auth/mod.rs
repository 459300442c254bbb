//! Auth handlers and supporting modules.
//!
//! Login verifies an email/password pair against an Argon2id hash and issues an
//! opaque bearer token. Only the SHA-256 hash of a token is ever stored, and
//! logout deletes the row for the presented token only.
//!
//! ## Credential failures
//!
//! An unknown email and a wrong password produce the same `422` body keyed
//! under `credentials`. When the email is unknown a dummy hash is still
//! verified so both paths cost about the same.

mod password;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use principal::Principal;
pub use state::{AuthConfig, AuthState, MAX_SESSION_TTL_SECONDS};
#[cfg(test)]
pub(crate) use password::test_params as password_test_params;
