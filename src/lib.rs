//! # Scolaris (Academic Records API)
//!
//! `scolaris` is the backend of a school administration panel. It exposes
//! uniform CRUD resources for students, professors, classes, subjects,
//! enrollments, grades and absences, computes report cards, and guards every
//! resource behind opaque bearer sessions.
//!
//! ## Sessions
//!
//! `POST /api/sessions` verifies an email/password pair against an Argon2id
//! hash and mints a random bearer token. Only the SHA-256 hash of the token is
//! persisted. `DELETE /api/sessions` revokes the presented token and nothing
//! else, so other devices of the same user stay signed in.
//!
//! ## Resources
//!
//! Every entity lives under `/api/v1/{resource}` and shares the same contract:
//! list (with whitelisted equality filters), show, create, update (partial
//! merge) and delete. Entities are described once in [`model`] and reused by
//! the typed [`client`].
//!
//! ## Client
//!
//! The [`client`] module carries the front-end behavior that matters for
//! correctness: the auth gate and its route guards, per-entity CRUD clients,
//! and a list cache that reconciles by identifier after mutations.

pub mod api;
pub mod cli;
pub mod client;
pub mod grading;
pub mod model;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
