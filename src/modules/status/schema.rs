use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use uuid::Uuid;

use crate::modules::contact::schema::ContactEntity;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "status_content_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StatusContentType {
    Text,
    Image,
    Video,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Type, Serialize, Deserialize)]
#[sqlx(type_name = "status_privacy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StatusPrivacy {
    Everyone,
    Contacts,
    CloseFriends,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusEntity {
    pub id: Uuid,
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
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl StatusEntity {
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at <= now
    }

    /// `entry` is the author's contact entry about the viewer, if any.
    pub fn is_visible_to(&self, viewer_id: &Uuid, entry: Option<&ContactEntity>) -> bool {
        if self.user_id == *viewer_id {
            return true;
        }
        if entry.is_some_and(|e| e.is_blocked) {
            return false;
        }
        match self.privacy {
            StatusPrivacy::Everyone => true,
            StatusPrivacy::Contacts => entry.is_some(),
            StatusPrivacy::CloseFriends => entry.is_some_and(|e| e.is_close_friend),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusViewEntity {
    pub id: Uuid,
    pub status_id: Uuid,
    pub viewer_id: Uuid,
    pub viewed_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn status(privacy: StatusPrivacy, created_at: chrono::DateTime<Utc>) -> StatusEntity {
        StatusEntity {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            content_type: StatusContentType::Text,
            content: Some("hello".into()),
            media_ref: None,
            caption: None,
            background_color: None,
            text_color: None,
            font_style: None,
            privacy,
            expires_at: created_at + Duration::hours(24),
            created_at,
        }
    }

    fn entry(status: &StatusEntity, viewer: Uuid, blocked: bool, close: bool) -> ContactEntity {
        ContactEntity {
            owner_id: status.user_id,
            contact_id: viewer,
            nickname: None,
            is_blocked: blocked,
            is_close_friend: close,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let t = Utc::now();
        let s = status(StatusPrivacy::Everyone, t);
        assert!(!s.is_expired_at(t + Duration::hours(23) + Duration::minutes(59)));
        assert!(s.is_expired_at(t + Duration::hours(24)));
        assert!(s.is_expired_at(t + Duration::hours(24) + Duration::minutes(1)));
    }

    #[test]
    fn test_privacy_scopes() {
        let viewer = Uuid::now_v7();

        let everyone = status(StatusPrivacy::Everyone, Utc::now());
        assert!(everyone.is_visible_to(&viewer, None));
        assert!(!everyone.is_visible_to(&viewer, Some(&entry(&everyone, viewer, true, false))));

        let contacts = status(StatusPrivacy::Contacts, Utc::now());
        assert!(!contacts.is_visible_to(&viewer, None));
        assert!(contacts.is_visible_to(&viewer, Some(&entry(&contacts, viewer, false, false))));

        let close = status(StatusPrivacy::CloseFriends, Utc::now());
        assert!(!close.is_visible_to(&viewer, Some(&entry(&close, viewer, false, false))));
        assert!(close.is_visible_to(&viewer, Some(&entry(&close, viewer, false, true))));

        assert!(close.is_visible_to(&close.user_id.clone(), None));
    }
}
