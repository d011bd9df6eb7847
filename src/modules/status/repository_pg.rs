use uuid::Uuid;

use crate::{
    api::error,
    modules::status::{
        model::NewStatus,
        repository::StatusRepository,
        schema::{StatusEntity, StatusViewEntity},
    },
};

#[derive(Clone)]
pub struct StatusRepositoryPg {
    pool: sqlx::PgPool,
}

impl StatusRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StatusRepository for StatusRepositoryPg {
    async fn create_status(&self, status: &NewStatus) -> Result<StatusEntity, error::SystemError> {
        let status = sqlx::query_as::<_, StatusEntity>(
            r#"
            INSERT INTO statuses (
                id, user_id, content_type, content, media_ref, caption,
                background_color, text_color, font_style, privacy, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(status.user_id)
        .bind(status.content_type)
        .bind(&status.content)
        .bind(&status.media_ref)
        .bind(&status.caption)
        .bind(&status.background_color)
        .bind(&status.text_color)
        .bind(&status.font_style)
        .bind(status.privacy)
        .bind(status.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(status)
    }

    async fn find_status(&self, id: &Uuid) -> Result<Option<StatusEntity>, error::SystemError> {
        let status = sqlx::query_as::<_, StatusEntity>("SELECT * FROM statuses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status)
    }

    async fn find_active_by_authors(
        &self,
        author_ids: &[Uuid],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StatusEntity>, error::SystemError> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        let statuses = sqlx::query_as::<_, StatusEntity>(
            r#"
            SELECT * FROM statuses
            WHERE user_id = ANY($1) AND expires_at > $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(author_ids)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(statuses)
    }

    async fn has_viewed(&self, status_id: &Uuid, viewer_id: &Uuid) -> Result<bool, error::SystemError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM status_views WHERE status_id = $1 AND viewer_id = $2)",
        )
        .bind(status_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_view(
        &self,
        status_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        // the unique constraint decides the race
        let result = sqlx::query(
            r#"
            INSERT INTO status_views (id, status_id, viewer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT status_views_status_viewer DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(status_id)
        .bind(viewer_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_views(&self, status_id: &Uuid) -> Result<i64, error::SystemError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM status_views WHERE status_id = $1")
                .bind(status_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn find_views(
        &self,
        status_id: &Uuid,
    ) -> Result<Vec<StatusViewEntity>, error::SystemError> {
        let views = sqlx::query_as::<_, StatusViewEntity>(
            r#"
            SELECT * FROM status_views
            WHERE status_id = $1
            ORDER BY viewed_at DESC
            "#,
        )
        .bind(status_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(views)
    }

    async fn find_viewed_ids(
        &self,
        viewer_id: &Uuid,
        status_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, error::SystemError> {
        if status_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT status_id FROM status_views WHERE viewer_id = $1 AND status_id = ANY($2)",
        )
        .bind(viewer_id)
        .bind(status_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn update_expiry(
        &self,
        id: &Uuid,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<StatusEntity>, error::SystemError> {
        let status = sqlx::query_as::<_, StatusEntity>(
            "UPDATE statuses SET expires_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn delete_status(&self, id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query("DELETE FROM statuses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError> {
        let result = sqlx::query("DELETE FROM statuses WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
