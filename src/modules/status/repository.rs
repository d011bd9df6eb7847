use uuid::Uuid;

use crate::{
    api::error,
    modules::status::{
        model::NewStatus,
        schema::{StatusEntity, StatusViewEntity},
    },
};

#[async_trait::async_trait]
pub trait StatusRepository {
    async fn create_status(&self, status: &NewStatus) -> Result<StatusEntity, error::SystemError>;

    /// Expired rows not yet cleaned up are returned too.
    async fn find_status(&self, id: &Uuid) -> Result<Option<StatusEntity>, error::SystemError>;

    /// Statuses with `expires_at > now`, oldest first.
    async fn find_active_by_authors(
        &self,
        author_ids: &[Uuid],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StatusEntity>, error::SystemError>;

    async fn has_viewed(&self, status_id: &Uuid, viewer_id: &Uuid) -> Result<bool, error::SystemError>;

    /// `false` when the (status, viewer) pair already exists.
    async fn record_view(
        &self,
        status_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    async fn count_views(&self, status_id: &Uuid) -> Result<i64, error::SystemError>;

    /// Newest first.
    async fn find_views(&self, status_id: &Uuid)
        -> Result<Vec<StatusViewEntity>, error::SystemError>;

    /// Subset of `status_ids` the viewer has seen.
    async fn find_viewed_ids(
        &self,
        viewer_id: &Uuid,
        status_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, error::SystemError>;

    async fn update_expiry(
        &self,
        id: &Uuid,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<StatusEntity>, error::SystemError>;

    async fn delete_status(&self, id: &Uuid) -> Result<bool, error::SystemError>;

    /// Removes every status with `expires_at <= now`; returns the count.
    async fn delete_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError>;
}
