use uuid::Uuid;

use crate::{
    api::error,
    modules::user::{
        repository::UserRepository,
        schema::{UserEntity, UserSummary},
    },
};

#[derive(Clone)]
pub struct UserRepositoryPg {
    pool: sqlx::PgPool,
}

impl UserRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for UserRepositoryPg {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError> {
        let user = sqlx::query_as::<_, UserEntity>(
            "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, error::SystemError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username, display_name, avatar_url
            FROM users
            WHERE id = ANY($1)
            AND deleted_at IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
