//! Notification gateway
//!
//! Booking lifecycle events are pushed to users through this boundary.
//! Delivery is strictly best-effort: the booking workflow never fails a
//! financial transaction because a notification could not be sent.

mod queue;

pub use queue::{Queue, QueueSettings, SqsNotifier};

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A booking lifecycle event to be delivered to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationMessage {
    BookingConfirmed {
        user_id: Uuid,
        booking_id: Uuid,
        movie_title: String,
        start_time: DateTime<Utc>,
    },
    BookingUpdated {
        user_id: Uuid,
        booking_id: Uuid,
        movie_title: String,
        start_time: DateTime<Utc>,
        total_seats: i32,
    },
    BookingCancelled {
        user_id: Uuid,
        booking_id: Uuid,
        movie_title: String,
        start_time: DateTime<Utc>,
    },
}

impl NotificationMessage {
    /// Message kind label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationMessage::BookingConfirmed { .. } => "booking_confirmed",
            NotificationMessage::BookingUpdated { .. } => "booking_updated",
            NotificationMessage::BookingCancelled { .. } => "booking_cancelled",
        }
    }

    /// The user the message is addressed to
    pub fn user_id(&self) -> Uuid {
        match self {
            NotificationMessage::BookingConfirmed { user_id, .. }
            | NotificationMessage::BookingUpdated { user_id, .. }
            | NotificationMessage::BookingCancelled { user_id, .. } => *user_id,
        }
    }
}

/// Fire-and-forget notification dispatch
///
/// Implementations must not block booking completion; callers log and
/// swallow errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &NotificationMessage) -> Result<()>;
}

/// Notifier that only logs. Used when no queue is configured, and in tests.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        tracing::info!(
            kind = message.kind(),
            user_id = %message.user_id(),
            "Notification (log-only delivery)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let msg = NotificationMessage::BookingConfirmed {
            user_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            movie_title: "Arrival".to_string(),
            start_time: Utc::now(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"booking_confirmed\""));

        let parsed: NotificationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind(), "booking_confirmed");
        assert_eq!(parsed.user_id(), msg.user_id());
    }
}
