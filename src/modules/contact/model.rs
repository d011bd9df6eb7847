use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::user::schema::UserSummary;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddContactRequest {
    pub contact_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CloseFriendRequest {
    pub value: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub user: UserSummary,
    pub nickname: Option<String>,
    pub is_blocked: bool,
    pub is_close_friend: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
