//! Postgres implementation of the store traits.
//!
//! Entity rows are read with `to_jsonb(t)` and written through
//! `jsonb_populate_record`, so one set of statements serves every table. Table
//! and column names only ever come from the `Resource` constants, never from
//! request input.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, Connection, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{NewUser, ResourceStore, SessionStore, StoreError, UserRecord, UserStore};
use crate::model::{Role, Table, User};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NOT_NULL_VIOLATION: &str = "23502";
const CHECK_VIOLATION: &str = "23514";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const INVALID_DATETIME_FORMAT: &str = "22007";
const DATETIME_FIELD_OVERFLOW: &str = "22008";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Map constraint and data errors to store errors; everything else is opaque.
fn classify(err: sqlx::Error, context: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code().map(|code| code.to_string()).unwrap_or_default();
        let detail = db_err
            .constraint()
            .map_or_else(|| db_err.message().to_string(), ToString::to_string);
        match code.as_str() {
            UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION => return StoreError::Conflict(detail),
            NOT_NULL_VIOLATION
            | CHECK_VIOLATION
            | INVALID_TEXT_REPRESENTATION
            | INVALID_DATETIME_FORMAT
            | DATETIME_FIELD_OVERFLOW => return StoreError::Invalid(detail),
            _ => {}
        }
    }
    StoreError::Other(anyhow::Error::new(err).context(context))
}

fn column_list(table: Table) -> String {
    table.columns.join(", ")
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let role: String = row.get("role");
    let role = role
        .parse::<Role>()
        .map_err(|err| StoreError::Other(anyhow::anyhow!(err)))?;
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = "SELECT id, name, email, role, password_hash, created_at FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .map_err(|err| classify(err, "failed to lookup user by email"))?;

        row.map(|row| {
            Ok(UserRecord {
                user: user_from_row(&row)?,
                password_hash: row.get("password_hash"),
            })
        })
        .transpose()
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at
        ";
        let row = sqlx::query(query)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| classify(err, "failed to insert user"))?;
        user_from_row(&row)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        // The unreferenced DELETE still runs; it prunes the user's dead sessions.
        let query = r"
            WITH pruned AS (
                DELETE FROM user_sessions
                WHERE user_id = $1 AND expires_at IS NOT NULL AND expires_at <= NOW()
            )
            INSERT INTO user_sessions (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
        ";
        sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| classify(err, "failed to insert session"))?;
        Ok(())
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<User>, StoreError> {
        // Touch last_used_at and resolve the owner in one round trip.
        let query = r"
            WITH session AS (
                UPDATE user_sessions
                SET last_used_at = NOW()
                WHERE token_hash = $1
                  AND (expires_at IS NULL OR expires_at > NOW())
                RETURNING user_id
            )
            SELECT u.id, u.name, u.email, u.role, u.created_at
            FROM session s
            JOIN users u ON u.id = s.user_id
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .map_err(|err| classify(err, "failed to lookup session"))?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<bool, StoreError> {
        let query = "DELETE FROM user_sessions WHERE token_hash = $1";
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .map_err(|err| classify(err, "failed to delete session"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn list(
        &self,
        table: Table,
        filters: &[(String, String)],
    ) -> Result<Vec<Value>, StoreError> {
        let mut query = format!("SELECT to_jsonb(t) FROM {} t", table.name);
        let mut bound = Vec::with_capacity(filters.len());
        for (index, (column, value)) in filters.iter().enumerate() {
            if !table.columns.contains(&column.as_str()) {
                return Err(StoreError::Invalid(format!("unknown column: {column}")));
            }
            query.push_str(if index == 0 { " WHERE " } else { " AND " });
            query.push_str(&format!("(to_jsonb(t) ->> '{column}') = ${}", index + 1));
            bound.push(value.as_str());
        }
        query.push_str(" ORDER BY t.id");

        let mut statement = sqlx::query_scalar::<_, Value>(&query);
        for value in bound {
            statement = statement.bind(value);
        }
        statement
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .map_err(|err| classify(err, "failed to list rows"))
    }

    async fn get(&self, table: Table, id: i64) -> Result<Option<Value>, StoreError> {
        let query = format!("SELECT to_jsonb(t) FROM {} t WHERE t.id = $1", table.name);
        sqlx::query_scalar::<_, Value>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .map_err(|err| classify(err, "failed to fetch row"))
    }

    async fn insert(&self, table: Table, row: Map<String, Value>) -> Result<Value, StoreError> {
        let columns = column_list(table);
        let query = format!(
            "INSERT INTO {name} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $1) \
             RETURNING to_jsonb(t)",
            name = table.name
        );
        sqlx::query_scalar::<_, Value>(&query)
            .bind(Json(Value::Object(row)))
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .map_err(|err| classify(err, "failed to insert row"))
    }

    async fn update(
        &self,
        table: Table,
        id: i64,
        row: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let columns = column_list(table);
        let query = format!(
            "UPDATE {name} AS t SET ({columns}) = \
             (SELECT {columns} FROM jsonb_populate_record(NULL::{name}, $2)), \
             updated_at = NOW() \
             WHERE t.id = $1 \
             RETURNING to_jsonb(t)",
            name = table.name
        );
        sqlx::query_scalar::<_, Value>(&query)
            .bind(id)
            .bind(Json(Value::Object(row)))
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .map_err(|err| classify(err, "failed to update row"))
    }

    async fn delete(&self, table: Table, id: i64) -> Result<bool, StoreError> {
        let query = format!("DELETE FROM {} WHERE id = $1", table.name);
        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", &query))
            .await
            .map_err(|err| classify(err, "failed to delete row"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;
        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;
        Ok(())
    }
}
