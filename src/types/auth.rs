//! Wire types for the EchoCheck auth endpoints

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Credential Pair
// ============================================================================

/// The credential pair held by the store
///
/// Both tokens are opaque strings. They are always set and cleared together;
/// no reader ever observes one half without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token attached as the bearer credential
    pub access_token: String,

    /// Long-lived refresh token used to mint the next pair
    pub refresh_token: String,
}

impl TokenPair {
    /// Create a pair from its two tokens
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// ============================================================================
// Token Grant
// ============================================================================

/// Token grant returned by the refresh and verify endpoints
///
/// `token_type` and `expires_in` are informational; the pipeline reacts to
/// 401 responses rather than scheduling ahead of expiry, so only the two
/// tokens are retained via the [`TokenPair`] conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining the next grant
    pub refresh_token: String,

    /// Token type (the server always sends "bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenGrant> for TokenPair {
    fn from(grant: TokenGrant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
        }
    }
}

// ============================================================================
// Auth Responses
// ============================================================================

/// User record returned by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id
    pub id: String,

    /// Email address the account was registered with
    pub email: String,

    /// Whether the email address has been verified
    pub is_verified: bool,

    /// Account creation time
    #[serde(deserialize_with = "deserialize_utc_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// The server serializes datetimes without a UTC offset, so accept naive
/// ISO-8601 (read as UTC) alongside RFC 3339.
fn deserialize_utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Completed sign-in or sign-up: the user record plus a fresh grant
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// The authenticated user
    pub user: User,

    /// Credential grant for the new session
    pub tokens: TokenGrant,
}

/// Challenge response: a verification code was emailed to the user
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSent {
    /// Displayable status message
    pub message: String,

    /// Email the code was sent to
    pub email: String,

    /// Minutes until the code expires
    pub expires_in_minutes: u32,
}

/// Plain acknowledgement body (logout and similar endpoints)
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Displayable status message
    pub message: String,
}

/// Outcome of beginning a sign-in or sign-up
///
/// The login and register endpoints answer with either a completed session
/// or a verification challenge; serde picks the variant by shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginOutcome {
    /// Credentials were accepted and a session was established
    Complete(AuthResponse),

    /// A verification code must be submitted before the session starts
    VerificationRequired(VerificationSent),
}

/// Which verification flow a resent code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    /// Code that completes a new registration
    Registration,

    /// Code that completes a sign-in
    Login,
}
