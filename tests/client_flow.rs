use anyhow::{anyhow, Result};
use argon2::Params;
use scolaris::{
    api::{self, handlers::auth::AuthConfig},
    client::{
        bulletin, ApiClient, AuthClient, AuthGate, AuthState, ClientError, GuardOutcome,
        MemoryTokenStore, RenderContext, ResourceClient, ResourceList, RouteGuard, TokenStore,
        LOGIN_ROUTE,
    },
    model::{Niveau, Role},
    store::Stores,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const PASSWORD: &str = "correct horse battery";

/// Serve the full router over in-memory stores on an ephemeral port.
async fn serve() -> Result<String> {
    let params = Params::new(8, 1, 1, None).map_err(|err| anyhow!("{err}"))?;
    let config = AuthConfig::default().with_password_params(params);
    let app = api::app(&Stores::memory(), config)?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Ok(format!("http://{addr}"))
}

fn client(base_url: &str, store: Arc<MemoryTokenStore>) -> Result<ApiClient> {
    let gate = AuthGate::new(store, RenderContext::Browser);
    Ok(ApiClient::new(base_url, gate)?)
}

async fn signed_in(base_url: &str, email: &str) -> Result<(ApiClient, Arc<MemoryTokenStore>)> {
    let store = Arc::new(MemoryTokenStore::new());
    let api = client(base_url, store.clone())?;
    let auth = AuthClient::new(api.clone());
    auth.resolve_session().await;
    auth.register("Staff", email, PASSWORD).await?;
    auth.login(email, PASSWORD).await?;
    Ok((api, store))
}

fn niveau(code: &str, libelle: &str) -> Niveau {
    Niveau {
        code: code.to_string(),
        libelle: libelle.to_string(),
    }
}

#[tokio::test]
async fn login_then_crud_then_logout() -> Result<()> {
    let base_url = serve().await?;
    let store = Arc::new(MemoryTokenStore::new());
    let api = client(&base_url, store.clone())?;
    let auth = AuthClient::new(api.clone());

    assert_eq!(auth.resolve_session().await, AuthState::Unauthenticated);
    assert_eq!(
        api.gate().check(RouteGuard::RequireAuth).await,
        GuardOutcome::Redirect(LOGIN_ROUTE)
    );

    let registered = auth
        .register("Admin", "admin@school.test", PASSWORD)
        .await?;
    assert_eq!(registered.role, Role::Secretaire);
    // Registration does not sign in.
    assert!(!api.gate().current().is_authenticated());

    let user = auth.login("admin@school.test", PASSWORD).await?;
    assert_eq!(user.email, "admin@school.test");
    assert!(api.gate().current().is_authenticated());
    assert_eq!(api.gate().check(RouteGuard::RequireAuth).await, GuardOutcome::Allow);
    assert!(store.load().await?.is_some());

    let niveaux = ResourceClient::<Niveau>::new(api.clone());
    let mut list = ResourceList::new();

    let sixieme = niveaux.create(&niveau("6E", "Sixieme")).await?;
    list.reconcile(sixieme.clone());
    let cinquieme = niveaux.create(&niveau("5E", "Cinquieme")).await?;
    list.reconcile(cinquieme.clone());

    let fetched = niveaux.get(sixieme.id).await?;
    assert_eq!(fetched, sixieme);

    let mut patch = Map::new();
    patch.insert("libelle".to_string(), Value::from("Sixième"));
    let updated = niveaux.update(sixieme.id, &patch).await?;
    assert_eq!(updated.data.code, "6E");
    assert_eq!(updated.data.libelle, "Sixième");
    list.reconcile(updated);
    assert_eq!(list.len(), 2);
    assert_eq!(
        list.find(sixieme.id).map(|r| r.data.libelle.as_str()),
        Some("Sixième")
    );

    let filtered = niveaux.list(&[("code", "5E")]).await?;
    assert_eq!(filtered, vec![cinquieme.clone()]);

    niveaux.delete(cinquieme.id).await?;
    assert!(list.remove(cinquieme.id));
    assert!(matches!(
        niveaux.get(cinquieme.id).await,
        Err(ClientError::NotFound)
    ));

    list.refresh(&niveaux, &[]).await?;
    assert_eq!(list.len(), 1);

    auth.logout().await?;
    assert_eq!(api.gate().current(), AuthState::Unauthenticated);
    assert!(store.load().await?.is_none());
    assert!(matches!(
        niveaux.list(&[]).await,
        Err(ClientError::Authentication(_))
    ));
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_are_an_authentication_error() -> Result<()> {
    let base_url = serve().await?;
    let (api, _) = signed_in(&base_url, "prof@school.test").await?;
    let auth = AuthClient::new(api.clone());
    auth.logout().await?;

    let err = auth.login("prof@school.test", "wrong password").await.err();
    assert!(matches!(err, Some(ClientError::Authentication(_))));
    let err = auth.login("ghost@school.test", "wrong password").await.err();
    assert!(matches!(err, Some(ClientError::Authentication(_))));
    assert!(!api.gate().current().is_authenticated());

    let err = auth.login("", "").await.err();
    let fields = err.as_ref().and_then(ClientError::field_errors);
    assert!(fields.is_some_and(|errors| errors.contains("email") && errors.contains("password")));
    Ok(())
}

#[tokio::test]
async fn a_revoked_token_signs_the_client_out() -> Result<()> {
    let base_url = serve().await?;
    let (api, store) = signed_in(&base_url, "secretaire@school.test").await?;
    let token = api
        .gate()
        .token()
        .ok_or_else(|| anyhow!("no token after login"))?;

    // The same token revoked from elsewhere.
    let status = reqwest::Client::new()
        .delete(format!("{base_url}/api/sessions"))
        .bearer_auth(&token)
        .send()
        .await?
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);

    let niveaux = ResourceClient::<Niveau>::new(api.clone());
    assert!(matches!(
        niveaux.list(&[]).await,
        Err(ClientError::Authentication(_))
    ));
    assert_eq!(api.gate().current(), AuthState::Unauthenticated);
    assert!(store.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn stored_sessions_are_confirmed_with_the_server() -> Result<()> {
    let base_url = serve().await?;
    let (api, store) = signed_in(&base_url, "returning@school.test").await?;
    let stored = store
        .load()
        .await?
        .ok_or_else(|| anyhow!("session was not persisted"))?;
    drop(api);

    // A fresh process picks the session back up.
    let restarted = client(&base_url, Arc::new(MemoryTokenStore::with_session(stored.clone())))?;
    let state = AuthClient::new(restarted.clone()).resolve_session().await;
    assert_eq!(state.token(), Some(stored.token.as_str()));
    assert_eq!(
        restarted.gate().check(RouteGuard::GuestOnly).await,
        GuardOutcome::Redirect("/dashboard")
    );

    // A forged token is dropped on resolution.
    let mut forged = stored;
    forged.token = "forged".to_string();
    let forged_store = Arc::new(MemoryTokenStore::with_session(forged));
    let stale = client(&base_url, forged_store.clone())?;
    let state = AuthClient::new(stale).resolve_session().await;
    assert_eq!(state, AuthState::Unauthenticated);
    assert!(forged_store.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn server_validation_errors_reach_the_caller() -> Result<()> {
    let base_url = serve().await?;
    let (api, _) = signed_in(&base_url, "validator@school.test").await?;
    let niveaux = ResourceClient::<Niveau>::new(api.clone());

    let err = niveaux.list(&[("libelle", "x")]).await.err();
    assert!(err
        .as_ref()
        .and_then(ClientError::field_errors)
        .is_some_and(|errors| errors.contains("libelle")));
    assert_eq!(err.map(|err| err.status()), Some(422));

    let mut patch = Map::new();
    patch.insert("colour".to_string(), Value::from("red"));
    let created = niveaux.create(&niveau("3E", "Troisieme")).await?;
    let err = niveaux.update(created.id, &patch).await.err();
    assert!(err
        .as_ref()
        .and_then(ClientError::field_errors)
        .is_some_and(|errors| errors.contains("colour")));

    assert!(matches!(
        bulletin(&api, 4242, 1).await,
        Err(ClientError::NotFound)
    ));
    Ok(())
}
