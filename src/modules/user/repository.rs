use uuid::Uuid;

use crate::{
    api::error,
    modules::user::schema::{UserEntity, UserSummary},
};

#[async_trait::async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError>;

    async fn exists(&self, id: &Uuid) -> Result<bool, error::SystemError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn find_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, error::SystemError>;
}
