//! # relay-core
//!
//! Domain layer for the realtime gateway: typed identifiers, entity payloads,
//! the domain error taxonomy, and the collaborator ports (auth, durable store,
//! push). This crate has zero dependencies on infrastructure (database, web
//! framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{MessageRecord, MessageSender, UserProfile};
pub use error::{DomainError, DomainResult};
pub use traits::{MembershipRepository, PresenceRepository, PushNotifier, TokenVerifier};
pub use value_objects::{ConnectionId, MessageId, RoomId, UserId};
