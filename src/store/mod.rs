//! Persistence seams: accounts, bearer sessions and generic entity rows.
//!
//! Handlers only see the traits below. `PgStore` backs production, while
//! `MemoryStore` keeps the same contract in process for tests and local runs.

mod memory;
mod pg;
pub mod schema;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Role, Table, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique key or foreign key violation.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Row rejected by the database (bad value for a column type).
    #[error("invalid data: {0}")]
    Invalid(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Account row including the password hash, only used by the verifier.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match on the normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Returns `Conflict` when the email is already registered.
    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a token hash, first dropping the user's expired sessions.
    /// Returns `Conflict` on hash collision.
    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Resolve a token hash to its owner. Expired sessions never resolve and
    /// may be deleted on the way.
    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<User>, StoreError>;

    /// Delete the session for this hash only; `false` when nothing matched.
    async fn delete_session(&self, token_hash: &[u8]) -> Result<bool, StoreError>;
}

/// JSON-level CRUD over entity tables. Rows are objects holding `id` plus the
/// table columns.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Rows whose column text equals the filter value, ordered by id.
    async fn list(&self, table: Table, filters: &[(String, String)])
        -> Result<Vec<Value>, StoreError>;

    async fn get(&self, table: Table, id: i64) -> Result<Option<Value>, StoreError>;

    async fn insert(&self, table: Table, row: Map<String, Value>) -> Result<Value, StoreError>;

    /// Overwrite the given columns; `None` when the id does not exist.
    async fn update(
        &self,
        table: Table,
        id: i64,
        row: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    async fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError>;

    /// Health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// The store handles shared by the router.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub resources: Arc<dyn ResourceStore>,
}

impl Stores {
    #[must_use]
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            sessions: store.clone(),
            resources: store,
        }
    }

    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            sessions: store.clone(),
            resources: store,
        }
    }
}

/// Text rendering of a JSON scalar, as Postgres `->>` would produce it.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}
