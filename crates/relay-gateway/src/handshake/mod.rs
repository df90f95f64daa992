//! Authentication handshake
//!
//! Governs a raw connection's lifecycle from accept to authenticated:
//! `Connecting → AwaitingAuth → Authenticated → Closed`. While awaiting auth
//! the acceptance policy is deliberately narrow: only an `auth` frame
//! advances the state, and everything else (unknown kinds, malformed frames,
//! even valid `typing`/`heartbeat` messages) is ignored so an unauthenticated
//! peer can make no use of the connection.

use crate::protocol::{ClientMessage, Inbound};
use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use relay_core::{TokenVerifier, UserId};
use std::time::Duration;

/// Handshake states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Raw transport accepted, no frames exchanged yet
    Connecting,
    /// Waiting for the one `auth` control message
    AwaitingAuth,
    /// Credential verified, session may be registered
    Authenticated,
    /// Terminal
    Closed,
}

/// How the handshake ended
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// Credential verified; the connection may enter the event loop
    Authenticated(UserId),
    /// Credential presented and rejected
    Rejected(String),
    /// Peer closed the transport (or it errored) before authenticating
    ClosedEarly,
    /// The bounded wait for an `auth` frame expired
    TimedOut,
}

impl HandshakeOutcome {
    /// The state the machine ended in
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        match self {
            Self::Authenticated(_) => HandshakeState::Authenticated,
            Self::Rejected(_) | Self::ClosedEarly | Self::TimedOut => HandshakeState::Closed,
        }
    }
}

/// What to do with one frame received while awaiting auth
#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthStep {
    /// Credential to verify
    Credential(String),
    /// Not an auth frame; keep waiting
    Ignore,
    /// Transport is gone
    Close,
}

/// Classify a single inbound frame under the awaiting-auth policy
fn classify(frame: Option<Result<Message, axum::Error>>) -> AuthStep {
    match frame {
        Some(Ok(Message::Text(text))) => match Inbound::parse(&text) {
            Ok(Inbound::Known(ClientMessage::Auth { token })) => AuthStep::Credential(token),
            Ok(other) => {
                tracing::debug!(frame = ?other, "Non-auth message before handshake, ignoring");
                AuthStep::Ignore
            }
            Err(e) => {
                tracing::debug!(error = %e, "Malformed frame before handshake, ignoring");
                AuthStep::Ignore
            }
        },
        // Control frames carry no credential; keep waiting
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => AuthStep::Ignore,
        Some(Ok(Message::Close(_))) | None => AuthStep::Close,
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Transport error during handshake");
            AuthStep::Close
        }
    }
}

/// Drive the handshake over the inbound frame stream
///
/// Reads frames until a valid `auth` message arrives, the peer goes away, or
/// the deadline expires. Verification happens through the `TokenVerifier`
/// port; a rejected credential is terminal (no retry within the connection).
pub async fn negotiate<S>(
    stream: &mut S,
    verifier: &dyn TokenVerifier,
    timeout: Duration,
) -> HandshakeOutcome
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let wait = tokio::time::timeout(timeout, async {
        loop {
            match classify(stream.next().await) {
                AuthStep::Credential(token) => return Some(token),
                AuthStep::Ignore => {}
                AuthStep::Close => return None,
            }
        }
    });

    let token = match wait.await {
        Ok(Some(token)) => token,
        Ok(None) => return HandshakeOutcome::ClosedEarly,
        Err(_) => return HandshakeOutcome::TimedOut,
    };

    match verifier.verify(&token).await {
        Ok(user_id) => HandshakeOutcome::Authenticated(user_id),
        Err(e) => {
            tracing::debug!(error = %e, "Handshake credential rejected");
            HandshakeOutcome::Rejected(e.to_string())
        }
    }
}
