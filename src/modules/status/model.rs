use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::error,
    modules::{
        status::schema::{StatusContentType, StatusEntity, StatusPrivacy},
        user::schema::UserSummary,
    },
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostStatusRequest {
    pub content_type: StatusContentType,
    #[validate(length(max = 700))]
    pub content: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub media_ref: Option<String>,
    #[validate(length(max = 700))]
    pub caption: Option<String>,
    #[validate(length(max = 32))]
    pub background_color: Option<String>,
    #[validate(length(max = 32))]
    pub text_color: Option<String>,
    #[validate(length(max = 32))]
    pub font_style: Option<String>,
    pub privacy: Option<StatusPrivacy>,
}

impl PostStatusRequest {
    pub fn validate_payload(&self) -> Result<(), error::SystemError> {
        match self.content_type {
            StatusContentType::Text => {
                if !self.content.as_deref().is_some_and(|c| !c.trim().is_empty()) {
                    return Err(error::SystemError::bad_request("Text statuses require content"));
                }
            }
            StatusContentType::Image | StatusContentType::Video => {
                if self.media_ref.is_none() {
                    return Err(error::SystemError::bad_request(
                        "Media statuses require a media reference",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewStatus {
    pub user_id: Uuid,
    pub content_type: StatusContentType,
    pub content: Option<String>,
    pub media_ref: Option<String>,
    pub caption: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub font_style: Option<String>,
    pub privacy: StatusPrivacy,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExtendStatusRequest {
    #[validate(range(min = 1, max = 48))]
    pub hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: StatusEntity,
    pub author: UserSummary,
    pub has_viewed: bool,
    /// Only filled for the author.
    pub view_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusWithViews {
    pub status: StatusEntity,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusViewer {
    pub viewer: UserSummary,
    pub viewed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewOutcome {
    pub status_id: Uuid,
    /// `false` when the view was already recorded or is the author's own.
    pub recorded: bool,
}

/// One author's active statuses in a viewer's feed, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct StatusFeedEntry {
    pub author: UserSummary,
    pub statuses: Vec<StatusEntity>,
    pub has_unviewed: bool,
    pub latest_at: chrono::DateTime<chrono::Utc>,
}
