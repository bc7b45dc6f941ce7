//! # EchoCheck Client for Rust
//!
//! Async client for the EchoCheck API with bearer-token authentication,
//! single-flight token refresh, and transparent request replay.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use echocheck_client::{ClientOptions, EchoCheckClient, LoginOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EchoCheckClient::new(
//!         ClientOptions::builder()
//!             .base_url("https://echocheck.app/api")
//!             .build(),
//!     )?;
//!
//!     match client.login("sam@example.com", "hunter2!").await? {
//!         LoginOutcome::VerificationRequired(sent) => {
//!             println!("code sent to {} ({} min)", sent.email, sent.expires_in_minutes);
//!         }
//!         LoginOutcome::Complete(auth) => {
//!             println!("signed in as {}", auth.user.email);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. The Authenticated Request Pipeline
//!
//! Every call made through the client attaches the stored access token.
//! When the token has expired, the first call to see a 401 refreshes it;
//! every other call that fails in the meantime waits for that single refresh
//! and then replays with the new token. Callers never see the machinery -
//! a recoverable expiry looks like a slightly slower success:
//!
//! ```no_run
//! # use echocheck_client::{ClientOptions, EchoCheckClient};
//! # use serde::Deserialize;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = EchoCheckClient::new(
//! #     ClientOptions::builder().base_url("https://echocheck.app/api").build(),
//! # )?;
//! #[derive(Deserialize)]
//! struct History {
//!     total: u64,
//! }
//!
//! // Goes through bearer attach, 401 detection, refresh, and replay
//! let history: History = client.get("/classify/history?limit=10").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 2. Two-Step Sign-In and Sign-Up
//!
//! Sign-in and sign-up are email-verified. Beginning either flow yields a
//! [`LoginOutcome`]: a completed session, or a challenge resolved by
//! submitting the emailed code:
//!
//! ```no_run
//! # use echocheck_client::{ClientOptions, EchoCheckClient, VerificationKind};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = EchoCheckClient::new(
//! #     ClientOptions::builder().base_url("https://echocheck.app/api").build(),
//! # )?;
//! client.register("sam@example.com", "hunter2!").await?;
//! client.resend_code("sam@example.com", VerificationKind::Registration).await?;
//!
//! let user = client.verify_registration("sam@example.com", "123456").await?;
//! println!("welcome, {}", user.email);
//! # Ok(())
//! # }
//! ```
//!
//! ### 3. Session Persistence
//!
//! The credential pair is written through to a JSON document in the platform
//! config directory (or a custom [`TokenBackend`]), so a new process resumes
//! the previous session. [`EchoCheckClient::current_user`] validates the
//! restored pair against the server.
//!
//! ### 4. Session Events
//!
//! When a refresh flight fails, the session is over: credentials are
//! cleared and exactly one [`SessionEvent::SignInRequired`] is emitted.
//! Applications take the receiver once and route to their sign-in surface:
//!
//! ```no_run
//! # use echocheck_client::{ClientOptions, EchoCheckClient};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let mut client = EchoCheckClient::new(
//! #     ClientOptions::builder().base_url("https://echocheck.app/api").build(),
//! # )?;
//! let mut events = client.take_session_events().unwrap();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         eprintln!("sign-in required: {event:?}");
//!     }
//! });
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into a few focused modules:
//!
//! - [`client`]: the session facade and entry point
//! - [`dispatch`]: request descriptors, bearer attach, and retry-once replay
//! - [`refresh`]: single-flight token refresh coordination
//! - [`store`]: credential persistence with pluggable backends
//! - [`types`]: wire types, client options, and session events
//! - [`error`]: error types and handling
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! To see logs, attach a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, ClientError>`](Result). A
//! rejected password is a business error, not a pipeline failure:
//!
//! ```no_run
//! # use echocheck_client::{ClientError, EchoCheckClient};
//! # async fn example(client: EchoCheckClient) {
//! match client.login("sam@example.com", "wrong-password").await {
//!     Ok(outcome) => { /* ... */ }
//!     Err(ClientError::Api { status: 401, detail }) => {
//!         eprintln!("sign-in rejected: {detail}");
//!     }
//!     Err(ClientError::AuthenticationFailed(reason)) => {
//!         eprintln!("session ended: {reason}");
//!     }
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! # }
//! ```
//!
//! ## Requirements
//!
//! - Rust 1.85.0 or later
//! - An EchoCheck API deployment to point `base_url` at

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod dispatch;
pub mod error;
pub mod refresh;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use client::EchoCheckClient;
pub use dispatch::{Auth, Dispatcher, MAX_AUTH_RETRIES, OutboundCall};
pub use error::{ClientError, Result};
pub use refresh::RefreshCoordinator;
pub use store::{CredentialStore, FileBackend, MemoryBackend, StoreError, TokenBackend};
pub use types::{
    AuthResponse, ClientOptions, ClientOptionsBuilder, LoginOutcome, Message, SessionEvent,
    TokenGrant, TokenPair, User, VerificationKind, VerificationSent,
};

/// Version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
