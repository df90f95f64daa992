//! Wire protocol
//!
//! UTF-8 JSON text frames in both directions. Inbound frames carry a `type`
//! discriminator; outbound frames are `{type, data}` envelopes except for the
//! handshake replies and `heartbeat_ack`.

mod messages;
mod payloads;

pub use messages::{ClientMessage, Inbound, ProtocolError, ServerMessage};
pub use payloads::{DeliveredPayload, PresenceStatus, TypingPayload, UserStatusPayload};
