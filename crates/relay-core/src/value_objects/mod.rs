//! Value objects - typed identifiers

mod ids;

pub use ids::{ConnectionId, MessageId, RoomId, UserId};
