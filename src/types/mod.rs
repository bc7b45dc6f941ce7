//! Type definitions for the EchoCheck client
//!
//! Wire types for the auth endpoints, client configuration, and the session
//! event surface.

// Module declarations
pub mod auth;
pub mod events;
pub mod options;

// Re-export all public types
pub use auth::{
    AuthResponse, LoginOutcome, Message, TokenGrant, TokenPair, User, VerificationKind,
    VerificationSent,
};
pub use events::SessionEvent;
pub use options::{ClientOptions, ClientOptionsBuilder};
