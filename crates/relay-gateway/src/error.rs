//! Gateway error types
//!
//! All of these are scoped to one connection or one recipient; none of them
//! is fatal to the process.

use crate::protocol::ProtocolError;
use relay_core::{DomainError, UserId};
use thiserror::Error;

/// Connection-scoped gateway error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Handshake credential rejected; terminal for that connection
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed frame or disallowed message in the current state
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport write to one recipient failed; recovered as a disconnect
    #[error("delivery to user {0} failed")]
    Delivery(UserId),

    /// A collaborator (durable store, push) failed
    #[error(transparent)]
    External(DomainError),
}

impl From<DomainError> for GatewayError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Unauthorized(msg) => Self::Unauthorized(msg),
            other => Self::External(other),
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
