//! Uniform CRUD handlers shared by every entity.
//!
//! Each [`Resource`] gets `GET|POST /api/v1/{path}` and
//! `GET|PUT|PATCH|DELETE /api/v1/{path}/{id}`. Updates are partial merges: the
//! stored row is overlaid with the patch, re-validated as a whole, then
//! written back.

mod docs;

pub use docs::{document, RESOURCES_TAG};

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, instrument};

use super::{auth::Principal, error::ApiError};
use crate::{
    model::{
        decode_errors, to_columns, Absence, AnneeScolaire, Classe, Eleve, Enseignement,
        FieldErrors, Inscription, Matiere, MentionBand, Niveau, Note, Parent, Professeur, Record,
        Resource, Semestre, Specialite, Ue,
    },
    store::ResourceStore,
};

pub type ResourceRepo = Arc<dyn ResourceStore>;

pub const API_PREFIX: &str = "/api/v1";

/// Keys a client may echo back on update; they are dropped, not rejected.
const READ_ONLY_KEYS: &[&str] = &["id", "created_at", "updated_at"];

/// Router with the CRUD routes of every entity.
pub fn router() -> Router {
    Router::new()
        .merge(resource_routes::<AnneeScolaire>())
        .merge(resource_routes::<Niveau>())
        .merge(resource_routes::<Specialite>())
        .merge(resource_routes::<Classe>())
        .merge(resource_routes::<Semestre>())
        .merge(resource_routes::<Ue>())
        .merge(resource_routes::<Matiere>())
        .merge(resource_routes::<MentionBand>())
        .merge(resource_routes::<Professeur>())
        .merge(resource_routes::<Parent>())
        .merge(resource_routes::<Eleve>())
        .merge(resource_routes::<Inscription>())
        .merge(resource_routes::<Enseignement>())
        .merge(resource_routes::<Note>())
        .merge(resource_routes::<Absence>())
}

fn resource_routes<R: Resource>() -> Router {
    Router::new()
        .route(
            &format!("{API_PREFIX}/{}", R::PATH),
            get(list::<R>).post(create::<R>),
        )
        .route(
            &format!("{API_PREFIX}/{}/{{id}}", R::PATH),
            get(show::<R>)
                .put(update::<R>)
                .patch(update::<R>)
                .delete(destroy::<R>),
        )
}

#[instrument(skip_all, fields(resource = R::PATH))]
async fn list<R: Resource>(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<Record<R>>>, ApiError> {
    let filters = parse_filters::<R>(params)?;
    let records = fetch_all::<R>(store.as_ref(), &filters).await?;
    debug!(count = records.len(), "listed");
    Ok(Json(records))
}

#[instrument(skip_all, fields(resource = R::PATH, id = id))]
async fn show<R: Resource>(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    Path(id): Path<i64>,
) -> Result<Json<Record<R>>, ApiError> {
    fetch::<R>(store.as_ref(), id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

#[instrument(skip_all, fields(resource = R::PATH))]
async fn create<R: Resource>(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record<R>>), ApiError> {
    let Json(payload) = payload?;
    let mut object = into_object(payload)?;
    R::prepare_create(&mut object);
    let entity = decode::<R>(object)?;
    let row = store.insert(R::table(), columns_of(&entity)?).await?;
    let record = from_row::<R>(row)?;
    debug!(id = record.id, "created");
    Ok((StatusCode::CREATED, Json(record)))
}

#[instrument(skip_all, fields(resource = R::PATH, id = id))]
async fn update<R: Resource>(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record<R>>, ApiError> {
    let Json(payload) = payload?;
    let mut patch = into_object(payload)?;
    patch.retain(|key, _| !READ_ONLY_KEYS.contains(&key.as_str()));
    check_patch_keys::<R>(&patch)?;

    let existing = store
        .get(R::table(), id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let mut merged = match existing {
        Value::Object(row) => row,
        other => {
            return Err(ApiError::Internal(anyhow::anyhow!(
                "stored row is not an object: {other}"
            )))
        }
    };
    merged.retain(|key, _| R::COLUMNS.contains(&key.as_str()));
    merged.extend(patch);

    let entity = decode::<R>(merged)?;
    let row = store
        .update(R::table(), id, columns_of(&entity)?)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(from_row::<R>(row)?))
}

#[instrument(skip_all, fields(resource = R::PATH, id = id))]
async fn destroy<R: Resource>(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if store.delete(R::table(), id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// Typed read of one row.
pub(crate) async fn fetch<R: Resource>(
    store: &dyn ResourceStore,
    id: i64,
) -> Result<Option<Record<R>>, ApiError> {
    store
        .get(R::table(), id)
        .await?
        .map(from_row::<R>)
        .transpose()
}

/// Typed read of every row matching the filters.
pub(crate) async fn fetch_all<R: Resource>(
    store: &dyn ResourceStore,
    filters: &[(String, String)],
) -> Result<Vec<Record<R>>, ApiError> {
    store
        .list(R::table(), filters)
        .await?
        .into_iter()
        .map(from_row::<R>)
        .collect()
}

fn parse_filters<R: Resource>(
    params: BTreeMap<String, String>,
) -> Result<Vec<(String, String)>, ApiError> {
    let mut errors = FieldErrors::new();
    for key in params.keys() {
        if !R::FILTERS.contains(&key.as_str()) {
            errors.add(key, format!("Filtering on {key} is not supported."));
        }
    }
    errors.into_result().map_err(ApiError::Validation)?;
    Ok(params.into_iter().collect())
}

fn check_patch_keys<R: Resource>(patch: &Map<String, Value>) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    for key in patch.keys() {
        if !R::COLUMNS.contains(&key.as_str()) {
            errors.add(key, format!("The {key} field cannot be updated."));
        }
    }
    errors.into_result().map_err(ApiError::Validation)
}

fn into_object(payload: Value) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Value::Object(object) => Ok(object),
        _ => Err(ApiError::field("payload", "The payload must be a JSON object.")),
    }
}

/// Decode and validate an entity from request data.
fn decode<R: Resource>(object: Map<String, Value>) -> Result<R, ApiError> {
    let entity: R = serde_json::from_value(Value::Object(object))
        .map_err(|err| ApiError::Validation(decode_errors(&err)))?;
    entity.validate().map_err(ApiError::Validation)?;
    Ok(entity)
}

fn columns_of<R: Resource>(entity: &R) -> Result<Map<String, Value>, ApiError> {
    to_columns(entity).map_err(|err| ApiError::Internal(err.into()))
}

fn from_row<R: Resource>(row: Value) -> Result<Record<R>, ApiError> {
    Record::from_row(row).map_err(|err| {
        ApiError::Internal(anyhow::Error::new(err).context(format!("malformed {} row", R::TABLE)))
    })
}

#[cfg(test)]
mod tests;
