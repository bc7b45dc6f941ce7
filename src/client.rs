//! EchoCheck session facade
//!
//! [`EchoCheckClient`] owns the credential store, the request dispatcher,
//! and the refresh coordinator, and exposes the session operations an
//! embedding application drives: sign-in and sign-up with email
//! verification, session restore, sign-out, and generic authenticated calls
//! for the rest of the API surface.
//!
//! One client is one session. All refresh coordination state lives inside
//! the instance; two clients never share a flight.
//!
//! # Example
//!
//! ```no_run
//! use echocheck_client::{ClientOptions, EchoCheckClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = EchoCheckClient::new(
//!         ClientOptions::builder()
//!             .base_url("https://echocheck.app/api")
//!             .build(),
//!     )?;
//!
//!     // React to the session ending (failed refresh) by re-prompting
//!     let mut events = client.take_session_events().unwrap();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("session event: {event:?}");
//!         }
//!     });
//!
//!     // A pair persisted by a previous run restores the session
//!     if let Some(user) = client.current_user().await {
//!         println!("signed in as {}", user.email);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::dispatch::{Dispatcher, OutboundCall};
use crate::error::Result;
use crate::refresh::RefreshCoordinator;
use crate::store::{CredentialStore, FileBackend, TokenBackend};
use crate::types::{
    AuthResponse, ClientOptions, LoginOutcome, Message, SessionEvent, TokenPair, User,
    VerificationKind, VerificationSent,
};

/// Client for the EchoCheck API
pub struct EchoCheckClient {
    store: Arc<CredentialStore>,
    dispatcher: Dispatcher,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl EchoCheckClient {
    /// Create a client from options
    ///
    /// Credentials persisted by a previous process are loaded here, so a
    /// restart resumes the session without a fresh sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let user_agent = options
            .user_agent
            .unwrap_or_else(|| concat!("echocheck-client/", env!("CARGO_PKG_VERSION")).to_string());
        let http = builder.user_agent(user_agent).build()?;

        let backend: Arc<dyn TokenBackend> = match (options.storage, options.credentials_path) {
            (Some(backend), _) => backend,
            (None, Some(path)) => Arc::new(FileBackend::with_path(path)),
            (None, None) => Arc::new(FileBackend::new()),
        };
        let store = Arc::new(CredentialStore::new(backend));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            &options.base_url,
            store.clone(),
            events_tx,
        ));
        let dispatcher = Dispatcher::new(http, &options.base_url, store.clone(), coordinator);

        Ok(Self {
            store,
            dispatcher,
            events_rx: Some(events_rx),
        })
    }

    // ========================================================================
    // Session establishment
    // ========================================================================

    /// Begin a sign-in
    ///
    /// Returns either a completed session (the credential pair is stored
    /// before this returns) or a verification challenge to resolve with
    /// [`EchoCheckClient::verify_login`].
    ///
    /// # Errors
    ///
    /// A rejected password surfaces as [`crate::ClientError::Api`] with
    /// status 401, an unverified account with status 403. Neither touches
    /// the refresh machinery.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let call = OutboundCall::post(
            "/auth/login",
            serde_json::json!({"email": email, "password": password}),
        )
        .public();

        let outcome: LoginOutcome = self.dispatcher.execute_json(call).await?;
        if let LoginOutcome::Complete(auth) = &outcome {
            self.adopt_session(auth)?;
        }
        Ok(outcome)
    }

    /// Begin a sign-up
    ///
    /// Symmetric to [`EchoCheckClient::login`]; the usual outcome is a
    /// verification challenge resolved with
    /// [`EchoCheckClient::verify_registration`].
    ///
    /// # Errors
    ///
    /// An already-registered email surfaces as [`crate::ClientError::Api`]
    /// with status 409.
    pub async fn register(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let call = OutboundCall::post(
            "/auth/register",
            serde_json::json!({"email": email, "password": password}),
        )
        .public();

        let outcome: LoginOutcome = self.dispatcher.execute_json(call).await?;
        if let LoginOutcome::Complete(auth) = &outcome {
            self.adopt_session(auth)?;
        }
        Ok(outcome)
    }

    /// Complete a sign-in with the emailed verification code
    ///
    /// # Errors
    ///
    /// An invalid or expired code surfaces as [`crate::ClientError::Api`]
    /// with status 400.
    pub async fn verify_login(&self, email: &str, code: &str) -> Result<User> {
        self.verify("/auth/login/verify", email, code).await
    }

    /// Complete a sign-up with the emailed verification code
    ///
    /// # Errors
    ///
    /// An invalid or expired code surfaces as [`crate::ClientError::Api`]
    /// with status 400.
    pub async fn verify_registration(&self, email: &str, code: &str) -> Result<User> {
        self.verify("/auth/register/verify", email, code).await
    }

    /// Ask the server to email a fresh verification code
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the request.
    pub async fn resend_code(
        &self,
        email: &str,
        kind: VerificationKind,
    ) -> Result<VerificationSent> {
        let call = OutboundCall::post(
            "/auth/resend-code",
            serde_json::json!({"email": email, "type": kind}),
        )
        .public();

        self.dispatcher.execute_json(call).await
    }

    async fn verify(&self, path: &str, email: &str, code: &str) -> Result<User> {
        let call =
            OutboundCall::post(path, serde_json::json!({"email": email, "code": code})).public();

        let auth: AuthResponse = self.dispatcher.execute_json(call).await?;
        self.adopt_session(&auth)?;
        Ok(auth.user)
    }

    /// Store the grant from a completed sign-in or sign-up
    fn adopt_session(&self, auth: &AuthResponse) -> Result<()> {
        self.store.set(TokenPair::from(auth.tokens.clone()))?;
        tracing::debug!(user_id = %auth.user.id, "Session established");
        Ok(())
    }

    // ========================================================================
    // Session state
    // ========================================================================

    /// Fetch the signed-in user, validating the stored session
    ///
    /// Any failure clears the credentials and yields `None`; the caller
    /// treats it as signed out. Used to validate a persisted pair on
    /// startup.
    pub async fn current_user(&self) -> Option<User> {
        if !self.store.has_credentials() {
            return None;
        }

        match self
            .dispatcher
            .execute_json::<User>(OutboundCall::get("/auth/me"))
            .await
        {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::debug!(error = %e, "Session validation failed, treating as signed out");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "Failed to clear credentials");
                }
                None
            }
        }
    }

    /// Sign out
    ///
    /// Best-effort server-side revocation followed by a local clear. The
    /// clear happens even when the server call fails, and signing out while
    /// already signed out succeeds without any network traffic.
    ///
    /// # Errors
    ///
    /// Returns an error only when the local credential wipe fails.
    pub async fn logout(&self) -> Result<()> {
        if self.store.has_credentials() {
            let call = OutboundCall::post("/auth/logout", serde_json::json!({}));
            match self.dispatcher.execute_json::<Message>(call).await {
                Ok(ack) => {
                    tracing::debug!(message = %ack.message, "Server acknowledged sign-out");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Server sign-out failed, clearing locally anyway");
                }
            }
        }

        self.store.clear()?;
        Ok(())
    }

    /// Whether a credential pair is currently held
    ///
    /// Presence means a session may exist; [`EchoCheckClient::current_user`]
    /// proves it against the server.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.has_credentials()
    }

    /// Take the session event receiver
    ///
    /// Carries the redirect-to-sign-in signal emitted when a refresh flight
    /// fails: at most one event per flight. Can only be taken once.
    pub fn take_session_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    /// Handle to the credential store
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    // ========================================================================
    // Generic authenticated calls
    // ========================================================================

    /// Authenticated GET returning a decoded body
    ///
    /// The rest of the API surface (classification, feedback, history) is
    /// reached through these passthroughs; expiry recovery applies exactly
    /// as for the session endpoints.
    ///
    /// # Errors
    ///
    /// As [`crate::ClientError`]: transport, authentication, API, or decode
    /// failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatcher.execute_json(OutboundCall::get(path)).await
    }

    /// Authenticated POST returning a decoded body
    ///
    /// # Errors
    ///
    /// As [`EchoCheckClient::get`], plus serialization failure of `body`.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let call = OutboundCall::post(path, serde_json::to_value(body)?);
        self.dispatcher.execute_json(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    fn offline_options() -> ClientOptions {
        // Unroutable base URL; these tests never leave the process
        ClientOptions::builder()
            .base_url("http://127.0.0.1:9")
            .storage(Arc::new(MemoryBackend::new()))
            .build()
    }

    #[test]
    fn test_take_session_events_only_once() {
        let mut client = EchoCheckClient::new(offline_options()).unwrap();

        assert!(client.take_session_events().is_some());
        assert!(client.take_session_events().is_none());
    }

    #[test]
    fn test_custom_storage_backend_restores_session() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .persist(&TokenPair::new("restored_access", "restored_refresh"))
            .unwrap();

        let client = EchoCheckClient::new(
            ClientOptions::builder()
                .base_url("http://127.0.0.1:9")
                .storage(backend)
                .build(),
        )
        .unwrap();

        assert!(client.is_authenticated());
        assert_eq!(
            client.credentials().access_token(),
            Some("restored_access".to_string())
        );
    }

    #[test]
    fn test_fresh_client_starts_signed_out() {
        let client = EchoCheckClient::new(offline_options()).unwrap();
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_current_user_without_credentials_is_none() {
        // Short-circuits before any request; the unroutable URL proves it
        let client = EchoCheckClient::new(offline_options()).unwrap();
        assert!(client.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_logout_when_signed_out_is_idempotent() {
        let client = EchoCheckClient::new(offline_options()).unwrap();

        client.logout().await.unwrap();
        client.logout().await.unwrap();

        assert!(!client.is_authenticated());
    }
}
