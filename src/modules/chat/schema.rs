use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

pub const PRIVATE_CHAT_SIZE: i32 = 2;
pub const DEFAULT_GROUP_MAX_PARTICIPANTS: i32 = 256;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "chat_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "participant_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatEntity {
    pub id: Uuid,
    pub kind: ChatKind,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub creator_id: Uuid,
    pub max_participants: i32,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub pair_key: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Per-user, per-chat pivot state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatParticipantEntity {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub left_at: Option<chrono::DateTime<chrono::Utc>>,
    pub muted_until: Option<chrono::DateTime<chrono::Utc>>,
    pub last_read_message_id: Option<i64>,
    pub is_archived: bool,
    pub is_pinned: bool,
}

impl ChatParticipantEntity {
    pub fn new(chat_id: Uuid, user_id: Uuid, role: ParticipantRole) -> Self {
        Self {
            chat_id,
            user_id,
            role,
            joined_at: chrono::Utc::now(),
            left_at: None,
            muted_until: None,
            last_read_message_id: None,
            is_archived: false,
            is_pinned: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn is_admin(&self) -> bool {
        self.role == ParticipantRole::Admin
    }

    pub fn is_muted_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.muted_until.is_some_and(|until| until > now)
    }
}

/// Dedup key of a private chat: the two user ids, lowest first.
pub fn private_pair_key(user_a: &Uuid, user_b: &Uuid) -> String {
    let (low, high) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
    format!("{low}:{high}")
}
