//! Entities shared by the API server and the typed client.
//!
//! Each entity implements [`Resource`], which binds it to a table, a URL
//! segment under `/api/v1`, the list of persisted columns and the columns that
//! may be used as list filters. Validation lives here too so the client can
//! reject obviously incomplete forms before a round trip.

mod entities;
mod user;

pub use entities::{
    Absence, AnneeScolaire, Classe, Eleve, Enseignement, EvaluationType, Inscription, Matiere,
    MentionBand, Niveau, Note, Parent, Professeur, Semestre, Sexe, Specialite, Ue,
};
pub use user::{Role, User};

use chrono::NaiveDate;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Field-keyed validation messages, serialized as `{"field": ["message"]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortcut for a single failing field.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// First message, used for toast-style summaries.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Storage descriptor for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    /// Column sets that must be unique across rows.
    pub unique: &'static [&'static [&'static str]],
}

/// An entity exposed as a uniform CRUD resource.
pub trait Resource:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// URL segment under `/api/v1`.
    const PATH: &'static str;
    const TABLE: &'static str;
    /// Persisted columns, `id` excluded.
    const COLUMNS: &'static [&'static str];
    /// Columns accepted as `?column=value` equality filters on list.
    const FILTERS: &'static [&'static str];
    /// Unique keys, mirroring the constraints in `sql/schema.sql`.
    const UNIQUE: &'static [&'static [&'static str]] = &[];

    /// Check field contents; missing fields are already rejected by serde.
    ///
    /// # Errors
    /// Returns the failing fields.
    fn validate(&self) -> Result<(), FieldErrors>;

    /// Fill server-side defaults into a create payload before it is decoded.
    fn prepare_create(_payload: &mut Map<String, Value>) {}

    #[must_use]
    fn table() -> Table {
        Table {
            name: Self::TABLE,
            columns: Self::COLUMNS,
            unique: Self::UNIQUE,
        }
    }
}

/// A persisted entity with its server-assigned identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: i64,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Resource> Record<T> {
    /// Decode a stored row (`id` plus columns, extra keys ignored).
    ///
    /// # Errors
    /// Returns an error if the row does not match the entity shape.
    pub fn from_row(row: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(row)
    }
}

/// Serialize an entity into the column map handed to a store.
///
/// # Errors
/// Returns an error if the entity does not serialize to a JSON object.
pub fn to_columns<T: Resource>(entity: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(entity)? {
        Value::Object(mut map) => {
            map.retain(|key, _| T::COLUMNS.contains(&key.as_str()));
            Ok(map)
        }
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Turn a serde decoding failure into a field-keyed message.
#[must_use]
pub fn decode_errors(err: &serde_json::Error) -> FieldErrors {
    let message = err.to_string();
    if let Some(rest) = message.strip_prefix("missing field `") {
        if let Some(field) = rest.split('`').next() {
            return FieldErrors::single(field, format!("The {field} field is required."));
        }
    }
    if let Some(rest) = message.strip_prefix("unknown variant `") {
        let value = rest.split('`').next().unwrap_or_default();
        return FieldErrors::single("payload", format!("Unsupported value `{value}`."));
    }
    FieldErrors::single("payload", strip_position(&message))
}

fn strip_position(message: &str) -> String {
    message
        .split(" at line ")
        .next()
        .unwrap_or(message)
        .to_string()
}

pub(crate) fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("The {field} field is required."));
    }
}

pub(crate) fn require_positive_id(errors: &mut FieldErrors, field: &str, value: i64) {
    if value <= 0 {
        errors.add(field, format!("The {field} field must reference an existing record."));
    }
}

pub(crate) fn require_date_order(
    errors: &mut FieldErrors,
    field: &str,
    start: NaiveDate,
    end: NaiveDate,
) {
    if end <= start {
        errors.add(field, format!("The {field} field must be after the start date."));
    }
}

pub(crate) fn check_optional_email(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(email) = value {
        if !valid_email(email.trim()) {
            errors.add(field, format!("The {field} field must be a valid email address."));
        }
    }
}

/// Basic email format check, shared with the credential verifier.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn field_errors_collect_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("nom", "required");
        errors.add("nom", "too short");
        errors.add("email", "invalid");
        assert_eq!(errors.get("nom").map(<[String]>::len), Some(2));
        assert!(errors.contains("email"));
        assert_eq!(errors.first_message(), Some("invalid"));
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn field_errors_serialize_as_plain_map() -> Result<()> {
        let errors = FieldErrors::single("email", "The email field is required.");
        let value = serde_json::to_value(&errors)?;
        assert_eq!(
            value,
            serde_json::json!({"email": ["The email field is required."]})
        );
        Ok(())
    }

    #[test]
    fn decode_errors_names_missing_field() {
        let err = serde_json::from_value::<Niveau>(serde_json::json!({"code": "6E"}));
        let Err(err) = err else {
            panic!("decoding should fail without libelle");
        };
        let errors = decode_errors(&err);
        assert!(errors.contains("libelle"));
    }

    #[test]
    fn to_columns_keeps_only_persisted_fields() -> Result<()> {
        let niveau = Niveau {
            code: "6E".to_string(),
            libelle: "Sixième".to_string(),
        };
        let columns = to_columns(&niveau)?;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns.get("code"), Some(&Value::from("6E")));
        Ok(())
    }

    #[test]
    fn record_flattens_entity_fields() -> Result<()> {
        let row = serde_json::json!({
            "id": 7,
            "code": "5E",
            "libelle": "Cinquième",
            "created_at": "2024-09-01T00:00:00Z"
        });
        let record: Record<Niveau> = Record::from_row(row)?;
        assert_eq!(record.id, 7);
        assert_eq!(record.data.code, "5E");
        let back = serde_json::to_value(&record)?;
        assert!(back.get("created_at").is_none());
        Ok(())
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }
}
