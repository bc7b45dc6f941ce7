//! Session lifecycle events emitted by the request pipeline

/// Events published on the session channel
///
/// At most one event is emitted per failed refresh flight, no matter how many
/// calls were queued behind it. The embedder typically reacts by routing to
/// its sign-in surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session ended and cannot be recovered without a new sign-in
    SignInRequired {
        /// Why the session ended
        reason: String,
    },
}
