use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::{
    chat::schema::{ChatEntity, ChatKind, ChatParticipantEntity, ParticipantRole},
    message::model::MessageView,
    user::schema::UserSummary,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewChatRequest {
    pub kind: ChatKind,
    /// Other user of a private chat.
    pub participant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
    #[validate(range(min = 2, max = 1024))]
    pub max_participants: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewGroupChat {
    pub creator_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub member_ids: Vec<Uuid>,
    pub max_participants: i32,
}

/// Outcome of adding a user to a group, decided under the chat row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAdded {
    Added,
    AlreadyActive,
    Full,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
    pub role: Option<ParticipantRole>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MarkReadRequest {
    #[validate(range(min = 1))]
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MuteRequest {
    /// `None` unmutes.
    pub muted_until: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ToggleRequest {
    pub value: bool,
}

/// Pivot fields a participant can change about their own membership.
#[derive(Debug, Clone, Default)]
pub struct ParticipantUpdate {
    pub muted_until: Option<Option<chrono::DateTime<chrono::Utc>>>,
    pub is_archived: Option<bool>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantDetail {
    pub user: UserSummary,
    pub role: ParticipantRole,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub last_read_message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatDetail {
    pub chat: ChatEntity,
    pub participants: Vec<ParticipantDetail>,
    pub membership: ChatParticipantEntity,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub chat: ChatEntity,
    pub membership: ChatParticipantEntity,
    pub unread_count: i64,
    pub is_muted: bool,
    pub last_message: Option<MessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadPosition {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub last_read_message_id: Option<i64>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub chat_id: Uuid,
    pub unread_count: i64,
}

/// Row of `chats` joined with the caller's `chat_participants` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserChatRow {
    #[sqlx(flatten)]
    pub chat: ChatEntity,
    #[sqlx(flatten)]
    pub membership: ChatParticipantEntity,
}
