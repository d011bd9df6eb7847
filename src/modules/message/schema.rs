use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Contact,
}

impl MessageKind {
    pub fn requires_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio | Self::Document)
    }
}

/// Delivery state, ordered `Sent < Delivered < Read`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageEntity {
    pub id: i64,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_message_id: Option<i64>,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_ref: Option<String>,
    pub status: MessageStatus,
    pub sent_at: chrono::DateTime<chrono::Utc>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub edited_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A forward status move, applied only while the stored status is below `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: MessageStatus,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl MessageEntity {
    /// `None` when the message already reached `target`.
    ///
    /// Reading an undelivered message stamps `delivered_at` too, so
    /// `read_at` never exists without it.
    pub fn status_update(
        &self,
        target: MessageStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<StatusUpdate> {
        if self.status >= target {
            return None;
        }

        let delivered_at = self.delivered_at.unwrap_or(now);
        let read_at = match target {
            MessageStatus::Read => Some(now),
            _ => None,
        };

        Some(StatusUpdate { status: target, delivered_at, read_at })
    }

    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.delivered_at = Some(update.delivered_at);
        if update.read_at.is_some() {
            self.read_at = update.read_at;
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageReactionEntity {
    pub id: Uuid,
    pub message_id: i64,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(status: MessageStatus) -> MessageEntity {
        MessageEntity {
            id: 1,
            chat_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_message_id: None,
            kind: MessageKind::Text,
            content: Some("hi".into()),
            media_ref: None,
            status,
            sent_at: Utc::now(),
            delivered_at: None,
            read_at: None,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn test_status_never_moves_backward() {
        let now = Utc::now();
        assert!(message(MessageStatus::Read).status_update(MessageStatus::Delivered, now).is_none());
        assert!(message(MessageStatus::Delivered)
            .status_update(MessageStatus::Delivered, now)
            .is_none());
        assert!(message(MessageStatus::Read).status_update(MessageStatus::Read, now).is_none());
    }

    #[test]
    fn test_read_keeps_earlier_delivery_stamp() {
        let delivered = Utc::now() - Duration::minutes(5);
        let now = Utc::now();
        let mut m = message(MessageStatus::Sent);

        let update = m.status_update(MessageStatus::Delivered, delivered).unwrap();
        m.apply(&update);
        assert_eq!(m.delivered_at, Some(delivered));

        let update = m.status_update(MessageStatus::Read, now).unwrap();
        m.apply(&update);
        assert_eq!(m.status, MessageStatus::Read);
        assert_eq!(m.delivered_at, Some(delivered));
        assert_eq!(m.read_at, Some(now));
    }

    #[test]
    fn test_read_from_sent_stamps_delivery() {
        let now = Utc::now();
        let update = message(MessageStatus::Sent).status_update(MessageStatus::Read, now).unwrap();
        assert_eq!(update.delivered_at, now);
        assert_eq!(update.read_at, Some(now));
    }
}
