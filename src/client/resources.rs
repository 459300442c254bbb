//! Typed CRUD over `/api/v1/{resource}` and the list cache views keep.

use reqwest::Method;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use tracing::{instrument, warn};

use super::{errors::ClientError, http::ApiClient};
use crate::{
    api::handlers::resources::API_PREFIX,
    grading::Bulletin,
    model::{FieldErrors, Record, Resource},
};

/// Client for one entity type.
#[derive(Clone, Debug)]
pub struct ResourceClient<T> {
    api: ApiClient,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Resource> ResourceClient<T> {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self {
            api,
            _entity: PhantomData,
        }
    }

    fn collection() -> String {
        format!("{API_PREFIX}/{}", T::PATH)
    }

    fn item(id: i64) -> String {
        format!("{API_PREFIX}/{}/{id}", T::PATH)
    }

    /// # Errors
    /// `Validation` for a filter the resource does not accept.
    #[instrument(skip_all, fields(resource = T::PATH))]
    pub async fn list(&self, filters: &[(&str, &str)]) -> Result<Vec<Record<T>>, ClientError> {
        let request = self.api.request(Method::GET, &Self::collection()).query(filters);
        self.api.json(request).await
    }

    /// # Errors
    /// `NotFound` for an unknown id.
    #[instrument(skip_all, fields(resource = T::PATH, id = id))]
    pub async fn get(&self, id: i64) -> Result<Record<T>, ClientError> {
        self.api
            .json(self.api.request(Method::GET, &Self::item(id)))
            .await
    }

    /// Validate locally, then create.
    ///
    /// # Errors
    /// `Validation` before any request when a field is invalid.
    #[instrument(skip_all, fields(resource = T::PATH))]
    pub async fn create(&self, entity: &T) -> Result<Record<T>, ClientError> {
        entity.validate().map_err(ClientError::validation)?;
        let request = self.api.request(Method::POST, &Self::collection()).json(entity);
        self.api.json(request).await
    }

    /// Apply a partial update; absent fields keep their stored value.
    ///
    /// # Errors
    /// `Validation` when the patch names an unknown field or the merged
    /// record is invalid, `NotFound` for an unknown id.
    #[instrument(skip_all, fields(resource = T::PATH, id = id))]
    pub async fn update(&self, id: i64, patch: &Map<String, Value>) -> Result<Record<T>, ClientError> {
        let blank: Vec<&String> = patch
            .iter()
            .filter(|(_, value)| value.as_str().is_some_and(|text| text.trim().is_empty()))
            .map(|(key, _)| key)
            .collect();
        if !blank.is_empty() {
            let mut errors = FieldErrors::new();
            for key in blank {
                errors.add(key, format!("The {key} field must not be empty."));
            }
            return Err(ClientError::validation(errors));
        }

        let request = self.api.request(Method::PATCH, &Self::item(id)).json(patch);
        self.api.json(request).await
    }

    /// Replace every field of a record.
    ///
    /// # Errors
    /// As [`Self::update`].
    #[instrument(skip_all, fields(resource = T::PATH, id = id))]
    pub async fn replace(&self, id: i64, entity: &T) -> Result<Record<T>, ClientError> {
        entity.validate().map_err(ClientError::validation)?;
        let request = self.api.request(Method::PUT, &Self::item(id)).json(entity);
        self.api.json(request).await
    }

    /// # Errors
    /// `NotFound` for an unknown id.
    #[instrument(skip_all, fields(resource = T::PATH, id = id))]
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.api
            .empty(self.api.request(Method::DELETE, &Self::item(id)))
            .await
    }
}

/// Fetch a student's report card for one semester.
///
/// # Errors
/// `NotFound` for an unknown student, `Validation` for an unknown semester.
pub async fn bulletin(
    api: &ApiClient,
    eleve_id: i64,
    semestre_id: i64,
) -> Result<Bulletin, ClientError> {
    let request = api
        .request(Method::GET, &format!("{API_PREFIX}/bulletins/{eleve_id}"))
        .query(&[("semestre_id", semestre_id)]);
    api.json(request).await
}

/// The rows a list view shows, kept in step with mutations by identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceList<T> {
    items: Vec<Record<T>>,
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Resource> ResourceList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[Record<T>] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn find(&self, id: i64) -> Option<&Record<T>> {
        self.items.iter().find(|record| record.id == id)
    }

    /// Replace the row with the same id in place, or append a new one.
    pub fn reconcile(&mut self, record: Record<T>) {
        match self.items.iter_mut().find(|row| row.id == record.id) {
            Some(row) => *row = record,
            None => self.items.push(record),
        }
    }

    /// Drop the row with this id; returns whether one was present.
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|row| row.id != id);
        self.items.len() != before
    }

    /// Reload from the server. On failure the previous rows stay.
    ///
    /// # Errors
    /// Returns the load error so the caller can surface a notice.
    pub async fn refresh(
        &mut self,
        client: &ResourceClient<T>,
        filters: &[(&str, &str)],
    ) -> Result<(), ClientError> {
        match client.list(filters).await {
            Ok(items) => {
                self.items = items;
                Ok(())
            }
            Err(err) => {
                warn!(resource = T::PATH, "Failed to load list: {err}");
                Err(err)
            }
        }
    }
}
