//! Domain entities

mod message;
mod user;

pub use message::{MessageRecord, MessageSender};
pub use user::UserProfile;
