//! API handlers for the records service.
//!
//! Session and registration endpoints live in [`auth`], the generic entity
//! CRUD in [`resources`]. Everything under `/api/v1` requires a bearer token.

pub mod auth;
pub mod bulletins;
pub mod error;
pub mod health;
pub mod resources;
pub mod root;

pub use error::{ApiError, ErrorBody};
