use anyhow::{anyhow, Result};
use axum::{
    http::{Method, StatusCode},
    Router,
};
use serde_json::{json, Value};

use crate::{
    api::handlers::test_support::{app, register_and_login, send},
    model::{Eleve, Niveau, Record},
};

async fn signed_in() -> Result<(Router, String)> {
    let app = app()?;
    let token = register_and_login(&app, "secretaire@school.test").await?;
    Ok((app, token))
}

fn id_of(body: &Value) -> Result<i64> {
    body.get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("response has no id: {body}"))
}

fn eleve_payload() -> Value {
    json!({
        "matricule": "E-2024-001",
        "nom": "Diallo",
        "prenom": "Awa",
        "date_naissance": "2010-03-14",
        "sexe": "F",
        "email": null,
        "parent_id": null
    })
}

#[tokio::test]
async fn create_then_get_returns_payload_with_id() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/eleves",
        Some(&token),
        Some(eleve_payload()),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = id_of(&created)?;

    let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/eleves/{id}"), Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let record: Record<Eleve> = serde_json::from_value(fetched)?;
    let expected: Eleve = serde_json::from_value(eleve_payload())?;
    assert_eq!(record.id, id);
    assert_eq!(record.data, expected);
    Ok(())
}

#[tokio::test]
async fn patch_changes_only_the_given_fields() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/v1/niveaux",
        Some(&token),
        Some(json!({"code": "6E", "libelle": "Sixieme"})),
    )
    .await?;
    let id = id_of(&created)?;
    let uri = format!("/api/v1/niveaux/{id}");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"libelle": "Sixième"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    let record: Record<Niveau> = serde_json::from_value(fetched)?;
    assert_eq!(record.data.code, "6E");
    assert_eq!(record.data.libelle, "Sixième");

    // PUT shares the merge semantics and ignores an echoed id.
    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({"id": 999, "code": "6EME"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(id_of(&body)?, id);
    assert_eq!(body.get("libelle").and_then(Value::as_str), Some("Sixième"));
    Ok(())
}

#[tokio::test]
async fn patch_is_validated_against_the_merged_record() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/v1/niveaux",
        Some(&token),
        Some(json!({"code": "5E", "libelle": "Cinquieme"})),
    )
    .await?;
    let uri = format!("/api/v1/niveaux/{}", id_of(&created)?);

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"libelle": "  "}))).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.pointer("/errors/libelle").is_some());

    let (status, body) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"colour": "red"}))).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.pointer("/errors/colour").is_some());
    Ok(())
}

#[tokio::test]
async fn duplicate_unique_keys_are_conflicts() -> Result<()> {
    let (app, token) = signed_in().await?;
    let niveau = json!({"code": "6E", "libelle": "Sixieme"});
    let (status, _) = send(&app, Method::POST, "/api/v1/niveaux", Some(&token), Some(niveau.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/api/v1/niveaux", Some(&token), Some(niveau)).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, other) = send(
        &app,
        Method::POST,
        "/api/v1/niveaux",
        Some(&token),
        Some(json!({"code": "5E", "libelle": "Cinquieme"})),
    )
    .await?;
    let uri = format!("/api/v1/niveaux/{}", id_of(&other)?);
    let (status, _) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"code": "6E"}))).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, fetched) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(fetched.get("code").and_then(Value::as_str), Some("5E"));
    Ok(())
}

#[tokio::test]
async fn delete_then_get_is_not_found() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (_, created) = send(
        &app,
        Method::POST,
        "/api/v1/niveaux",
        Some(&token),
        Some(json!({"code": "4E", "libelle": "Quatrieme"})),
    )
    .await?;
    let uri = format!("/api/v1/niveaux/{}", id_of(&created)?);

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::PATCH, &uri, Some(&token), Some(json!({"code": "X"}))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn list_applies_whitelisted_filters() -> Result<()> {
    let (app, token) = signed_in().await?;
    for (code, libelle) in [("6E", "Sixieme"), ("5E", "Cinquieme")] {
        send(
            &app,
            Method::POST,
            "/api/v1/niveaux",
            Some(&token),
            Some(json!({"code": code, "libelle": libelle})),
        )
        .await?;
    }

    let (status, all) = send(&app, Method::GET, "/api/v1/niveaux", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let (status, filtered) = send(&app, Method::GET, "/api/v1/niveaux?code=5E", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered.as_array().map(Vec::len), Some(1));
    assert_eq!(filtered.pointer("/0/libelle").and_then(Value::as_str), Some("Cinquieme"));

    let (status, body) = send(&app, Method::GET, "/api/v1/niveaux?libelle=x", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.pointer("/errors/libelle").is_some());
    Ok(())
}

#[tokio::test]
async fn create_reports_missing_and_invalid_fields() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/niveaux",
        Some(&token),
        Some(json!({"code": "3E"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.pointer("/errors/libelle").is_some());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/notes",
        Some(&token),
        Some(json!({
            "eleve_id": 1,
            "matiere_id": 1,
            "semestre_id": 1,
            "valeur": 25,
            "type_evaluation": "devoir"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.pointer("/errors/valeur").is_some());
    Ok(())
}

#[tokio::test]
async fn absence_status_is_derived_when_omitted() -> Result<()> {
    let (app, token) = signed_in().await?;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/absences",
        Some(&token),
        Some(json!({
            "eleve_id": 1,
            "date": "2024-10-02",
            "heures": 2,
            "motif": "Certificat médical"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.get("statut").and_then(Value::as_str), Some("justifiee"));
    Ok(())
}

#[tokio::test]
async fn resources_require_a_bearer_token() -> Result<()> {
    let (app, _) = signed_in().await?;
    for (method, uri) in [
        (Method::GET, "/api/v1/eleves"),
        (Method::POST, "/api/v1/eleves"),
        (Method::GET, "/api/v1/eleves/1"),
        (Method::DELETE, "/api/v1/leparents/1"),
    ] {
        let (status, body) = send(&app, method, uri, None, Some(json!({}))).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body.get("message").and_then(Value::as_str), Some("Unauthenticated."));
    }

    let (status, _) = send(&app, Method::GET, "/api/v1/eleves", Some("forged"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
