//! User display profile

use crate::value_objects::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display info for a user, used to decorate presence events
///
/// Loaded from the durable store; `last_seen` is the store's last-seen mark
/// and may lag behind the live registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub last_seen: Option<DateTime<Utc>>,
}
