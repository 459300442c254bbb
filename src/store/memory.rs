use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    scalar_text, NewUser, ResourceStore, SessionStore, StoreError, UserRecord, UserStore,
};
use crate::model::{Table, User};

struct SessionRow {
    user_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<Vec<u8>, SessionRow>,
    tables: HashMap<&'static str, BTreeMap<i64, Map<String, Value>>>,
    next_ids: HashMap<&'static str, i64>,
}

/// In-process store with the same observable contract as [`super::PgStore`]:
/// unique keys are enforced, foreign keys are not.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRow {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Name of the first unique key `row` would duplicate, ignoring row `own_id`.
fn unique_violation(
    table: Table,
    rows: Option<&BTreeMap<i64, Map<String, Value>>>,
    own_id: Option<i64>,
    row: &Map<String, Value>,
) -> Option<String> {
    let rows = rows?;
    table.unique.iter().find_map(|key| {
        let values: Vec<&Value> = key
            .iter()
            .map(|column| row.get(*column).unwrap_or(&Value::Null))
            .collect();
        // NULLs never collide, as in Postgres.
        if values.iter().any(|value| value.is_null()) {
            return None;
        }
        let taken = rows.iter().any(|(id, other)| {
            Some(*id) != own_id
                && key
                    .iter()
                    .zip(&values)
                    .all(|(column, value)| other.get(*column) == Some(*value))
        });
        taken.then(|| format!("{}_{}_key", table.name, key.join("_")))
    })
}

fn with_id(id: i64, row: &Map<String, Value>) -> Value {
    let mut object = row.clone();
    object.insert("id".to_string(), Value::from(id));
    Value::Object(object)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.read().await.users.get(email).cloned())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&new_user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email.clone(),
            role: new_user.role,
            created_at: Utc::now(),
        };
        inner.users.insert(
            new_user.email,
            UserRecord {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        inner
            .sessions
            .retain(|_, row| !(row.user_id == user_id && row.expired(now)));
        if inner.sessions.contains_key(token_hash) {
            return Err(StoreError::Conflict("user_sessions_token_hash_key".to_string()));
        }
        inner.sessions.insert(
            token_hash.to_vec(),
            SessionRow {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get(token_hash) else {
            return Ok(None);
        };
        if session.expired(Utc::now()) {
            inner.sessions.remove(token_hash);
            return Ok(None);
        }
        Ok(inner
            .users
            .values()
            .find(|record| record.user.id == session.user_id)
            .map(|record| record.user.clone()))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .write()
            .await
            .sessions
            .remove(token_hash)
            .is_some())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(
        &self,
        table: Table,
        filters: &[(String, String)],
    ) -> Result<Vec<Value>, StoreError> {
        let inner = self.inner.read().await;
        let Some(rows) = inner.tables.get(table.name) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|(_, row)| {
                filters.iter().all(|(column, expected)| {
                    row.get(column)
                        .and_then(scalar_text)
                        .is_some_and(|text| &text == expected)
                })
            })
            .map(|(id, row)| with_id(*id, row))
            .collect())
    }

    async fn get(&self, table: Table, id: i64) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tables
            .get(table.name)
            .and_then(|rows| rows.get(&id))
            .map(|row| with_id(id, row)))
    }

    async fn insert(&self, table: Table, row: Map<String, Value>) -> Result<Value, StoreError> {
        let mut inner = self.inner.write().await;
        let mut stored = Map::new();
        for column in table.columns {
            stored.insert(
                (*column).to_string(),
                row.get(*column).cloned().unwrap_or(Value::Null),
            );
        }
        if let Some(key) = unique_violation(table, inner.tables.get(table.name), None, &stored) {
            return Err(StoreError::Conflict(key));
        }
        let next = inner.next_ids.entry(table.name).or_insert(0);
        *next += 1;
        let id = *next;
        let value = with_id(id, &stored);
        inner.tables.entry(table.name).or_default().insert(id, stored);
        Ok(value)
    }

    async fn update(
        &self,
        table: Table,
        id: i64,
        row: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut inner = self.inner.write().await;
        let rows = inner.tables.get(table.name);
        let Some(mut merged) = rows.and_then(|rows| rows.get(&id)).cloned() else {
            return Ok(None);
        };
        for (column, value) in row {
            if table.columns.contains(&column.as_str()) {
                merged.insert(column, value);
            }
        }
        if let Some(key) = unique_violation(table, rows, Some(id), &merged) {
            return Err(StoreError::Conflict(key));
        }
        let value = with_id(id, &merged);
        inner.tables.entry(table.name).or_default().insert(id, merged);
        Ok(Some(value))
    }

    async fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .tables
            .get_mut(table.name)
            .is_some_and(|rows| rows.remove(&id).is_some()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
