//! Report card endpoint.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;

use super::{
    auth::Principal,
    error::{ApiError, ErrorBody},
    resources::{fetch, fetch_all, ResourceRepo},
};
use crate::{
    grading::{build_bulletin, Bulletin, BulletinInput, MentionScale},
    model::{Absence, Eleve, Matiere, MentionBand, Note, Semestre},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BulletinQuery {
    /// Semester to report on.
    pub semestre_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/bulletins/{eleve_id}",
    params(
        ("eleve_id" = i64, Path, description = "Student identifier")
    ),
    responses(
        (status = 200, description = "Report card of the student for the semester", body = Bulletin),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Unknown student", body = ErrorBody),
        (status = 422, description = "Missing or unknown semester", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "bulletins"
)]
#[instrument(skip_all, fields(eleve_id = eleve_id))]
pub async fn bulletin(
    _principal: Principal,
    Extension(store): Extension<ResourceRepo>,
    Path(eleve_id): Path<i64>,
    Query(query): Query<BulletinQuery>,
) -> Result<Json<Bulletin>, ApiError> {
    let eleve = fetch::<Eleve>(store.as_ref(), eleve_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let Some(semestre_id) = query.semestre_id else {
        return Err(ApiError::field(
            "semestre_id",
            "The semestre_id field is required.",
        ));
    };
    let semestre = fetch::<Semestre>(store.as_ref(), semestre_id)
        .await?
        .ok_or_else(|| ApiError::field("semestre_id", "The selected semestre_id is invalid."))?;

    let notes = fetch_all::<Note>(
        store.as_ref(),
        &[
            ("eleve_id".to_string(), eleve_id.to_string()),
            ("semestre_id".to_string(), semestre_id.to_string()),
        ],
    )
    .await?;
    let absences = fetch_all::<Absence>(
        store.as_ref(),
        &[("eleve_id".to_string(), eleve_id.to_string())],
    )
    .await?;
    let matieres = fetch_all::<Matiere>(store.as_ref(), &[]).await?;
    let bands = fetch_all::<MentionBand>(store.as_ref(), &[]).await?;
    let scale = MentionScale::from_configured(bands.into_iter().map(|band| band.data).collect());

    Ok(Json(build_bulletin(&BulletinInput {
        eleve: &eleve,
        semestre: &semestre,
        matieres: &matieres,
        notes: &notes,
        absences: &absences,
        scale: &scale,
    })))
}
