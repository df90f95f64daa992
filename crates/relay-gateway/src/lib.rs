//! # relay-gateway
//!
//! Real-time session and broadcast core: tracks which users are live on a
//! WebSocket, which rooms they belong to, and fans out events (messages,
//! typing, presence, delivery acks) to the right set of live connections.
//!
//! Persistence, push delivery and credential validation are consumed through
//! the ports in `relay-core`; the embedding server wires the implementations.

pub mod bridge;
pub mod broadcast;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod server;

pub use bridge::NotificationBridge;
pub use broadcast::Dispatcher;
pub use connection::{ConnectionRegistry, Session};
pub use error::GatewayError;
pub use server::{create_app, run_server, GatewayState};
