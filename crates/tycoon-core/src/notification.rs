//! Plain-text notifications handed to the messaging layer for delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Recipient {
    /// A single participant.
    User(UserId),
    /// The public announcement channel.
    Channel,
}

/// A message for the delivery layer. The core never delivers it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn to_user(user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::User(user_id),
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn to_channel(text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Channel,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether `user_id` should see this notification.
    ///
    /// Channel announcements are visible to everyone.
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        match self.recipient {
            Recipient::User(id) => id == user_id,
            Recipient::Channel => true,
        }
    }
}
