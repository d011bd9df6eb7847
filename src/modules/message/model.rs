use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::error,
    modules::message::schema::{
        MessageEntity, MessageKind, MessageReactionEntity, MessageStatus, DELETED_PLACEHOLDER,
    },
};

pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub kind: MessageKind,
    #[validate(length(max = 10000, message = "Message content is too long"))]
    pub content: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub media_ref: Option<String>,
    pub reply_to_message_id: Option<i64>,
}

impl SendMessageRequest {
    pub fn validate_payload(&self) -> Result<(), error::SystemError> {
        let has_content = self.content.as_deref().is_some_and(|c| !c.trim().is_empty());

        if self.kind.requires_media() {
            if self.media_ref.is_none() {
                return Err(error::SystemError::bad_request(format!(
                    "{:?} messages require a media reference",
                    self.kind
                )));
            }
        } else if !has_content {
            return Err(error::SystemError::bad_request(format!(
                "{:?} messages require content",
                self.kind
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InsertMessage {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_message_id: Option<i64>,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageQueryRequest {
    /// Only messages with a lower id are returned.
    pub cursor: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

/// Referenced message as shown above a reply.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyPreview {
    pub id: i64,
    pub sender_id: Uuid,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub is_deleted: bool,
}

impl From<&MessageEntity> for ReplyPreview {
    fn from(m: &MessageEntity) -> Self {
        ReplyPreview {
            id: m.id,
            sender_id: m.sender_id,
            kind: m.kind,
            content: if m.is_deleted { Some(DELETED_PLACEHOLDER.to_string()) } else { m.content.clone() },
            is_deleted: m.is_deleted,
        }
    }
}

/// Client-facing rendering of a message. Deleted content is never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub reply_to_message_id: Option<i64>,
    pub reply_to: Option<ReplyPreview>,
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

impl From<MessageEntity> for MessageView {
    fn from(m: MessageEntity) -> Self {
        let (content, media_ref) = if m.is_deleted {
            (Some(DELETED_PLACEHOLDER.to_string()), None)
        } else {
            (m.content, m.media_ref)
        };

        MessageView {
            id: m.id,
            chat_id: m.chat_id,
            sender_id: m.sender_id,
            reply_to_message_id: m.reply_to_message_id,
            reply_to: None,
            kind: m.kind,
            content,
            media_ref,
            status: m.status,
            sent_at: m.sent_at,
            delivered_at: m.delivered_at,
            read_at: m.read_at,
            edited_at: m.edited_at,
            is_deleted: m.is_deleted,
            deleted_at: m.deleted_at,
        }
    }
}

impl MessageView {
    pub fn with_reply(mut self, reply: Option<ReplyPreview>) -> Self {
        self.reply_to = reply;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetMessageResponse {
    pub messages: Vec<MessageView>,
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    pub users: Vec<Uuid>,
}

/// Groups reactions by emoji, most used first; ties keep first-seen order.
pub fn summarize_reactions(reactions: &[MessageReactionEntity]) -> Vec<ReactionSummary> {
    let mut summary: Vec<ReactionSummary> = Vec::new();

    for reaction in reactions {
        match summary.iter_mut().find(|s| s.emoji == reaction.emoji) {
            Some(entry) => {
                entry.count += 1;
                entry.users.push(reaction.user_id);
            }
            None => summary.push(ReactionSummary {
                emoji: reaction.emoji.clone(),
                count: 1,
                users: vec![reaction.user_id],
            }),
        }
    }

    summary.sort_by(|a, b| b.count.cmp(&a.count));
    summary
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangedPayload {
    pub message_id: i64,
    pub chat_id: Uuid,
    pub status: MessageStatus,
    pub user_id: Uuid,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionChangedPayload {
    pub message_id: i64,
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub reactions: Vec<ReactionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(user_id: Uuid, emoji: &str) -> MessageReactionEntity {
        MessageReactionEntity {
            id: Uuid::now_v7(),
            message_id: 1,
            user_id,
            emoji: emoji.into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_summarize_groups_by_emoji() {
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let summary =
            summarize_reactions(&[reaction(a, "👍"), reaction(b, "❤️"), reaction(c, "❤️")]);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0], ReactionSummary { emoji: "❤️".into(), count: 2, users: vec![b, c] });
        assert_eq!(summary[1].emoji, "👍");
    }

    #[test]
    fn test_payload_validation_per_kind() {
        let text = SendMessageRequest {
            kind: MessageKind::Text,
            content: Some("   ".into()),
            media_ref: None,
            reply_to_message_id: None,
        };
        assert!(text.validate_payload().is_err());

        let image = SendMessageRequest { kind: MessageKind::Image, content: None, ..text.clone() };
        assert!(image.validate_payload().is_err());

        let image = SendMessageRequest { media_ref: Some("media/1.png".into()), ..image };
        assert!(image.validate_payload().is_ok());

        let location = SendMessageRequest {
            kind: MessageKind::Location,
            content: Some("10.77,106.69".into()),
            ..text
        };
        assert!(location.validate_payload().is_ok());
    }

    #[test]
    fn test_deleted_message_renders_placeholder() {
        let entity = MessageEntity {
            id: 7,
            chat_id: Uuid::now_v7(),
            sender_id: Uuid::now_v7(),
            reply_to_message_id: None,
            kind: MessageKind::Image,
            content: Some("secret caption".into()),
            media_ref: Some("media/7.png".into()),
            status: MessageStatus::Sent,
            sent_at: chrono::Utc::now(),
            delivered_at: None,
            read_at: None,
            edited_at: None,
            is_deleted: true,
            deleted_at: Some(chrono::Utc::now()),
        };

        let preview = ReplyPreview::from(&entity);
        assert_eq!(preview.content.as_deref(), Some(DELETED_PLACEHOLDER));

        let view = MessageView::from(entity);
        assert_eq!(view.content.as_deref(), Some(DELETED_PLACEHOLDER));
        assert!(view.media_ref.is_none());
    }
}
