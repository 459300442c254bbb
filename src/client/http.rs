//! HTTP transport shared by the auth and resource clients.

use reqwest::{
    header::AUTHORIZATION, Client as HttpClient, Method, Request, RequestBuilder, Response,
    StatusCode,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{errors::ClientError, gate::AuthGate};
use crate::api::handlers::ErrorBody;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bearer-authenticated JSON client bound to one API base URL.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    gate: AuthGate,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the base URL is not absolute or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, gate: AuthGate) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url)
            .map_err(|err| ClientError::Network(format!("Invalid base URL {base_url}: {err}")))?;

        let http = HttpClient::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            gate,
        })
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match self.gate.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Parse(err.to_string()))
    }

    /// Send a request whose success carries no body.
    pub(crate) async fn empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.send(builder).await.map(|_| ())
    }

    #[instrument(skip_all)]
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let (http, request) = builder.build_split();
        let request = request?;
        let sent_token = bearer_token(&request);
        let response = http.execute(request).await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "api response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.ok();
        let message = body
            .as_ref()
            .map_or_else(|| default_message(status), |body| body.message.clone());

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                // Only the token this request carried is known to be dead.
                if let Some(token) = sent_token {
                    self.gate.sign_out_token(&token).await;
                }
                ClientError::Authentication(message)
            }
            StatusCode::NOT_FOUND => ClientError::NotFound,
            StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                message,
                errors: body.and_then(|body| body.errors).unwrap_or_default(),
            },
            _ => ClientError::Http {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToString::to_string)
}

fn default_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unexpected response")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        gate::RenderContext,
        token_store::{tests::session, MemoryTokenStore},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn attaches_the_gate_token() -> anyhow::Result<()> {
        let gate = AuthGate::new(
            Arc::new(MemoryTokenStore::with_session(session("abc"))),
            RenderContext::Browser,
        );
        gate.hydrate().await;
        let client = ApiClient::new("http://localhost:8080/", gate)?;

        let request = client.request(Method::GET, "/api/v1/eleves").build()?;
        assert_eq!(request.url().as_str(), "http://localhost:8080/api/v1/eleves");
        assert_eq!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
            Some("Bearer abc")
        );
        Ok(())
    }

    #[tokio::test]
    async fn reads_back_the_token_a_request_carries() -> anyhow::Result<()> {
        let gate = AuthGate::new(
            Arc::new(MemoryTokenStore::with_session(session("abc"))),
            RenderContext::Browser,
        );
        gate.hydrate().await;
        let client = ApiClient::new("http://localhost:8080", gate.clone())?;
        let request = client.request(Method::GET, "/api/user").build()?;

        // Signing in again does not rewrite a request already built.
        gate.sign_in("def".to_string(), session("def").user).await;
        assert_eq!(bearer_token(&request).as_deref(), Some("abc"));
        assert_eq!(gate.token().as_deref(), Some("def"));
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_token() -> anyhow::Result<()> {
        let gate = AuthGate::new(Arc::new(MemoryTokenStore::new()), RenderContext::Browser);
        gate.hydrate().await;
        let client = ApiClient::new("http://localhost:8080", gate)?;
        let request = client.request(Method::POST, "/api/sessions").build()?;
        assert!(request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn late_rejection_of_an_old_token_keeps_the_new_session() -> anyhow::Result<()> {
        use crate::{
            api::handlers::test_support::{app, PASSWORD},
            client::auth::AuthClient,
        };
        use serde_json::Value;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let router = app()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service()).await;
        });

        let gate = AuthGate::new(Arc::new(MemoryTokenStore::new()), RenderContext::Browser);
        let client = ApiClient::new(&base_url, gate.clone())?;
        let auth = AuthClient::new(client.clone());
        auth.resolve_session().await;
        auth.register("Staff", "staff@school.test", PASSWORD).await?;
        auth.login("staff@school.test", PASSWORD).await?;
        let old = gate.token().ok_or_else(|| anyhow::anyhow!("no token after login"))?;

        // A call that leaves with the old token and answers after a re-login.
        let in_flight = client.request(Method::GET, "/api/v1/niveaux");
        let status = HttpClient::new()
            .delete(format!("{base_url}/api/sessions"))
            .bearer_auth(&old)
            .send()
            .await?
            .status();
        assert_eq!(status, StatusCode::OK);
        auth.login("staff@school.test", PASSWORD).await?;
        let fresh = gate.token();
        assert!(fresh.is_some() && fresh.as_deref() != Some(old.as_str()));

        let result = client.json::<Value>(in_flight).await;
        assert!(matches!(result, Err(ClientError::Authentication(_))));
        assert!(gate.current().is_authenticated());
        assert_eq!(gate.token(), fresh);

        let rows = client
            .json::<Value>(client.request(Method::GET, "/api/v1/niveaux"))
            .await?;
        assert_eq!(rows, Value::Array(Vec::new()));
        Ok(())
    }

    #[test]
    fn rejects_relative_base_url() {
        let gate = AuthGate::new(Arc::new(MemoryTokenStore::new()), RenderContext::Browser);
        assert!(ApiClient::new("/api", gate).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() -> anyhow::Result<()> {
        let gate = AuthGate::new(Arc::new(MemoryTokenStore::new()), RenderContext::Browser);
        let client = ApiClient::new("http://127.0.0.1:1", gate)?;
        let result = client.empty(client.request(Method::GET, "/health")).await;
        assert!(matches!(result, Err(ClientError::Network(_))));
        assert_eq!(result.err().map(|err| err.status()), Some(0));
        Ok(())
    }
}
