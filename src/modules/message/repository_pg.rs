use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{
        model::InsertMessage,
        repository::MessageRepository,
        schema::{MessageEntity, MessageReactionEntity, StatusUpdate},
    },
};

#[derive(Clone)]
pub struct MessageRepositoryPg {
    pool: sqlx::PgPool,
}

impl MessageRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessageRepositoryPg {
    async fn create(&self, message: &InsertMessage) -> Result<MessageEntity, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (chat_id, sender_id, reply_to_message_id, kind, content, media_ref)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(message.reply_to_message_id)
        .bind(message.kind)
        .bind(&message.content)
        .bind(&message.media_ref)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<MessageEntity>, error::SystemError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let messages =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(messages)
    }

    async fn find_page(
        &self,
        chat_id: &Uuid,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        let messages = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
            AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(chat_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn find_latest(
        &self,
        chat_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            "SELECT * FROM messages WHERE chat_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn count_unread(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        after: Option<i64>,
    ) -> Result<i64, error::SystemError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE chat_id = $1
            AND sender_id <> $2
            AND ($3::BIGINT IS NULL OR id > $3)
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(after)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn advance_status(
        &self,
        id: i64,
        update: &StatusUpdate,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        // enum comparison follows declaration order: sent < delivered < read
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET status = $2,
                delivered_at = COALESCE(delivered_at, $3),
                read_at = COALESCE(read_at, $4)
            WHERE id = $1 AND status < $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.delivered_at)
        .bind(update.read_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn edit(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET content = $2, edited_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn soft_delete(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            UPDATE messages
            SET is_deleted = TRUE, deleted_at = NOW()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn upsert_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<MessageReactionEntity, error::SystemError> {
        let reaction = sqlx::query_as::<_, MessageReactionEntity>(
            r#"
            INSERT INTO message_reactions (id, message_id, user_id, emoji)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT message_reactions_message_user
            DO UPDATE SET emoji = EXCLUDED.emoji, created_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&self.pool)
        .await?;
        Ok(reaction)
    }

    async fn delete_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_reactions(
        &self,
        message_id: i64,
    ) -> Result<Vec<MessageReactionEntity>, error::SystemError> {
        let reactions = sqlx::query_as::<_, MessageReactionEntity>(
            r#"
            SELECT * FROM message_reactions
            WHERE message_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reactions)
    }
}
