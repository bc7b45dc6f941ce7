//! Request dispatch with bearer auth and refresh-and-replay
//!
//! Every outgoing call is described by an [`OutboundCall`], a rebuildable
//! descriptor that can be sent more than once. The dispatcher attaches the
//! stored access token, classifies the response, and on the first 401 of an
//! authenticated call asks the refresh coordinator for a fresh token and
//! replays the descriptor exactly once.

use reqwest::{Method, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{ClientError, Result};
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

/// How many times a call may be replayed after a 401
pub const MAX_AUTH_RETRIES: u32 = 1;

/// Authentication mode of an outgoing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach the stored access token; a 401 triggers refresh-and-replay
    Bearer,

    /// No credential attached; a 401 is an ordinary API error
    ///
    /// Session-establishment endpoints dispatch in this mode, so a rejected
    /// password surfaces as a business failure instead of tripping the
    /// refresh machinery.
    Public,
}

/// Rebuildable descriptor for one outgoing request
///
/// The body is kept as a JSON value rather than a consumed stream so the
/// call can be dispatched again after a token refresh.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    /// HTTP method
    pub method: Method,

    /// Path relative to the base URL, starting with `/`
    pub path: String,

    /// JSON body, when the call carries one
    pub body: Option<serde_json::Value>,

    /// Authentication mode
    pub auth: Auth,

    /// How many times this call has already been replayed
    pub attempt: u32,
}

impl OutboundCall {
    /// Describe an authenticated GET
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            auth: Auth::Bearer,
            attempt: 0,
        }
    }

    /// Describe an authenticated POST with a JSON body
    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            auth: Auth::Bearer,
            attempt: 0,
        }
    }

    /// Switch the call to unauthenticated dispatch
    #[must_use]
    pub fn public(mut self) -> Self {
        self.auth = Auth::Public;
        self
    }

    /// The same call, marked as one replay further along
    #[must_use]
    fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

/// Join a base URL and a request path
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Error body shape used by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Extract the displayable error detail from a failed response
///
/// The server reports errors as `{"detail": "..."}`. Anything else falls
/// back to the raw body text, then to the status reason.
pub(crate) async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
        return parsed.detail;
    }
    if !body.is_empty() {
        return body;
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

/// Sends outbound calls and recovers authenticated ones from expiry
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl Dispatcher {
    /// Create a dispatcher over a shared HTTP client and credential store
    ///
    /// [`crate::EchoCheckClient`] assembles one internally; construct one
    /// directly to drive the pipeline without the facade.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            coordinator,
        }
    }

    /// Dispatch a call and return the successful response
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] on transport failure,
    /// [`ClientError::AuthenticationFailed`] when the session cannot be
    /// recovered, and [`ClientError::Api`] for any other error status.
    pub async fn execute(&self, mut call: OutboundCall) -> Result<reqwest::Response> {
        let mut bearer = match call.auth {
            Auth::Bearer => self.store.access_token(),
            Auth::Public => None,
        };

        loop {
            let response = self.send(&call, bearer.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            // First 401 of an authenticated call: refresh once, then replay
            // with the token the flight delivered
            if status == StatusCode::UNAUTHORIZED
                && call.auth == Auth::Bearer
                && call.attempt < MAX_AUTH_RETRIES
            {
                tracing::debug!(path = %call.path, "Received 401, requesting fresh token");
                let token = self.coordinator.fresh_token().await?;
                call = call.retried();
                bearer = Some(token);
                continue;
            }

            let detail = error_detail(response).await;
            return Err(match call.auth {
                Auth::Bearer => ClientError::from_status(status, detail),
                Auth::Public => ClientError::api(status.as_u16(), detail),
            });
        }
    }

    /// Dispatch a call and decode the successful response body
    ///
    /// # Errors
    ///
    /// As [`Dispatcher::execute`], plus [`ClientError::Request`] when the
    /// body cannot be decoded as `T`.
    pub async fn execute_json<T: DeserializeOwned>(&self, call: OutboundCall) -> Result<T> {
        let response = self.execute(call).await?;
        Ok(response.json().await?)
    }

    async fn send(
        &self,
        call: &OutboundCall,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, &call.path);
        let mut request = self.http.request(call.method.clone(), url);

        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        tracing::trace!(
            method = %call.method,
            path = %call.path,
            attempt = call.attempt,
            "Dispatching request"
        );

        Ok(request.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::types::{SessionEvent, TokenPair};
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pipeline(
        base_url: &str,
        store: Arc<CredentialStore>,
    ) -> (Dispatcher, mpsc::UnboundedReceiver<SessionEvent>) {
        let http = reqwest::Client::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            base_url,
            store.clone(),
            events_tx,
        ));
        (Dispatcher::new(http, base_url, store, coordinator), events_rx)
    }

    #[test]
    fn test_retried_increments_attempt() {
        let call = OutboundCall::get("/auth/me");
        assert_eq!(call.attempt, 0);

        let replayed = call.retried();
        assert_eq!(replayed.attempt, 1);
        assert_eq!(replayed.path, "/auth/me");
    }

    #[test]
    fn test_call_builders() {
        let get = OutboundCall::get("/auth/me");
        assert_eq!(get.method, Method::GET);
        assert_eq!(get.auth, Auth::Bearer);
        assert!(get.body.is_none());

        let post = OutboundCall::post("/auth/login", serde_json::json!({"email": "a"})).public();
        assert_eq!(post.method, Method::POST);
        assert_eq!(post.auth, Auth::Public);
        assert!(post.body.is_some());
    }

    #[test]
    fn test_join_url_trims_trailing_slash() {
        assert_eq!(
            join_url("https://host/api/", "/auth/me"),
            "https://host/api/auth/me"
        );
        assert_eq!(
            join_url("https://host/api", "/auth/me"),
            "https://host/api/auth/me"
        );
    }

    #[tokio::test]
    async fn test_bearer_call_attaches_stored_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer stored_access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u1",
                "email": "sam@example.com",
                "is_verified": true,
                "created_at": "2025-06-01T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Arc::new(MemoryBackend::new())));
        store
            .set(TokenPair::new("stored_access", "stored_refresh"))
            .unwrap();
        let (dispatcher, _events) = pipeline(&server.uri(), store);

        let response = dispatcher.execute(OutboundCall::get("/auth/me")).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_unauthenticated_bearer_call_sends_no_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Invalid or expired access token"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Arc::new(MemoryBackend::new())));
        let (dispatcher, _events) = pipeline(&server.uri(), store);

        // No stored pair and no refresh token, so the call fails terminally
        let err = dispatcher
            .execute(OutboundCall::get("/auth/me"))
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_public_call_passes_401_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "sam@example.com",
                "password": "wrong"
            })))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Invalid email or password"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Arc::new(MemoryBackend::new())));
        let (dispatcher, _events) = pipeline(&server.uri(), store);

        let call = OutboundCall::post(
            "/auth/login",
            serde_json::json!({"email": "sam@example.com", "password": "wrong"}),
        )
        .public();
        let err = dispatcher.execute(call).await.unwrap_err();

        match err {
            ClientError::Api { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Invalid email or password");
            }
            other => panic!("expected business error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_401_error_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "detail": "Email already registered"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(CredentialStore::new(Arc::new(MemoryBackend::new())));
        let (dispatcher, _events) = pipeline(&server.uri(), store);

        let call = OutboundCall::post("/auth/register", serde_json::json!({})).public();
        let err = dispatcher.execute(call).await.unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "API error 409: Email already registered"
        );
    }
}
