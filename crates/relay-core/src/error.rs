//! Domain error taxonomy

use thiserror::Error;

/// Errors surfaced by the collaborator ports
///
/// Nothing here is process-fatal: an `Unauthorized` ends one handshake, and
/// an `ExternalService` failure abandons one fan-out path.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Invalid, expired or malformed credential
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The durable store or push collaborator failed
    #[error("external service error: {0}")]
    ExternalService(String),
}

impl DomainError {
    /// True if this is a credential problem rather than an infrastructure one
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Result type for collaborator operations
pub type DomainResult<T> = Result<T, DomainError>;
