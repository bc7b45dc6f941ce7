//! Single-flight token refresh coordination
//!
//! When several in-flight calls hit a 401 at once, exactly one refresh
//! request may reach the server. The flow works as follows:
//!
//! 1. The first call to report expiry takes the flight flag and becomes the
//!    leader; it posts the stored refresh token to `/auth/refresh`.
//! 2. Every call that reports expiry while the flight is up parks on a
//!    oneshot handle in the pending queue instead of refreshing again.
//! 3. When the flight settles, the flag is cleared and the queue is drained
//!    in one step; each parked call is resumed exactly once with the shared
//!    outcome and replays with the fresh token.
//! 4. A flight that cannot succeed (no refresh token stored, or the server
//!    rejected the refresh) clears the credentials, emits a single
//!    [`SessionEvent::SignInRequired`], and rejects the leader and every
//!    parked call. A failed flight is never retried on its own.
//!
//! The flight flag and queue live behind a `std::sync::Mutex` that is only
//! held for flag and queue updates, never across an await. That mutual
//! exclusion is what makes the single-flight guarantee hold on a
//! multi-threaded runtime.
//!
//! There is no timeout on the flight beyond the HTTP client's own request
//! timeout; until the refresh settles, parked calls stay parked.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

use crate::dispatch::{error_detail, join_url};
use crate::error::{ClientError, Result};
use crate::store::CredentialStore;
use crate::types::{SessionEvent, TokenGrant, TokenPair};

/// Outcome shared between the leader and every parked call
///
/// [`ClientError`] wraps `reqwest::Error` and cannot be cloned, so a flight
/// settles with the fresh access token or a reason string; each caller
/// rebuilds its own error from the reason.
type RefreshOutcome = std::result::Result<String, String>;

#[derive(Default)]
struct FlightState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Coordinates token refresh across concurrent calls
///
/// One instance per client, shared with the dispatcher through an `Arc`.
/// All coordination state is owned here; nothing is global.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<CredentialStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: Mutex<FlightState>,
}

impl RefreshCoordinator {
    /// Create a coordinator posting to `/auth/refresh` under the base URL
    ///
    /// Sign-in-required notifications for failed flights are sent on
    /// `events`.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        store: Arc<CredentialStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            http,
            refresh_url: join_url(base_url, "/auth/refresh"),
            store,
            events,
            state: Mutex::new(FlightState::default()),
        }
    }

    /// Obtain a fresh access token, joining the in-flight refresh if one is up
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthenticationFailed`] when the refresh cannot
    /// succeed; the credentials are already cleared and a
    /// [`SessionEvent::SignInRequired`] has been emitted by then.
    pub async fn fresh_token(&self) -> Result<String> {
        let parked = {
            let mut state = self.lock_state();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = parked {
            tracing::debug!("Refresh already in flight, parking until it settles");
            return match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(reason)) => Err(ClientError::authentication(reason)),
                Err(_) => Err(ClientError::authentication("refresh flight was dropped")),
            };
        }

        // This call owns the flight
        tracing::debug!("Starting token refresh");
        let outcome = self.run_refresh().await;
        self.settle(&outcome);

        outcome.map_err(ClientError::authentication)
    }

    /// Perform the refresh itself; the flight flag is already taken
    async fn run_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            return self.fail_flight("no refresh token available");
        };

        match self.request_grant(&refresh_token).await {
            Ok(grant) => {
                let pair = TokenPair::from(grant);
                let access = pair.access_token.clone();

                // Memory is updated even when persistence fails; the flight
                // still succeeds on the in-memory pair
                if let Err(e) = self.store.set(pair) {
                    tracing::warn!(error = %e, "Refreshed credentials could not be persisted");
                }

                tracing::debug!("Token refresh succeeded");
                Ok(access)
            }
            Err(reason) => self.fail_flight(&reason),
        }
    }

    /// Unified failure path: clear credentials, emit one sign-in-required
    /// event, and reject the whole flight
    ///
    /// A missing refresh token and a rejected refresh call land here alike;
    /// the session is over either way.
    fn fail_flight(&self, reason: &str) -> RefreshOutcome {
        tracing::warn!(reason, "Token refresh failed, session ended");

        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear credentials after refresh failure");
        }
        let _ = self.events.send(SessionEvent::SignInRequired {
            reason: reason.to_string(),
        });

        Err(reason.to_string())
    }

    /// Post the refresh token and parse the grant
    async fn request_grant(&self, refresh_token: &str) -> std::result::Result<TokenGrant, String> {
        let body = serde_json::json!({ "refresh_token": refresh_token });

        let response = match self.http.post(&self.refresh_url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return Err(format!("refresh request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(format!("refresh rejected ({}): {detail}", status.as_u16()));
        }

        match response.json::<TokenGrant>().await {
            Ok(grant) => Ok(grant),
            Err(e) => Err(format!("invalid refresh response: {e}")),
        }
    }

    /// Clear the flag and resume everything parked behind the flight
    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.lock_state();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            tracing::debug!(count = waiters.len(), "Resuming calls parked behind refresh");
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, FlightState> {
        // Recover from poisoning; flag and queue stay coherent
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
