//! Live-connection state
//!
//! `Session` is one user's live connection, `RoomIndex` the connection-scoped
//! user↔room cache, and `ConnectionRegistry` the single source of truth for
//! "is this user online", guarding both under one lock.

mod membership;
mod registry;
mod session;

pub use membership::RoomIndex;
pub use registry::{ConnectionRegistry, RemovedSession};
pub use session::Session;
