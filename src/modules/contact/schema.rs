use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// One directed entry of `owner_id`'s address book.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContactEntity {
    pub owner_id: Uuid,
    pub contact_id: Uuid,
    pub nickname: Option<String>,
    pub is_blocked: bool,
    pub is_close_friend: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
