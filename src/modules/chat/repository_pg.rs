use uuid::Uuid;

use crate::{
    api::error,
    modules::chat::{
        model::{NewGroupChat, ParticipantAdded, ParticipantUpdate, UserChatRow},
        repository::ChatRepository,
        schema::{
            private_pair_key, ChatEntity, ChatKind, ChatParticipantEntity, ParticipantRole,
            PRIVATE_CHAT_SIZE,
        },
    },
};

#[derive(Clone)]
pub struct ChatRepositoryPg {
    pool: sqlx::PgPool,
}

impl ChatRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn insert_participant<'e, E>(
        chat_id: &Uuid,
        user_id: &Uuid,
        role: ParticipantRole,
        tx: E,
    ) -> Result<(), error::SystemError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(role)
        .execute(tx)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChatRepository for ChatRepositoryPg {
    async fn find_by_id(&self, chat_id: &Uuid) -> Result<Option<ChatEntity>, error::SystemError> {
        let chat = sqlx::query_as::<_, ChatEntity>(
            "SELECT * FROM chats WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(chat)
    }

    async fn find_or_create_private(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<(ChatEntity, bool), error::SystemError> {
        let pair_key = private_pair_key(user_a, user_b);
        let mut tx = self.pool.begin().await?;

        // a concurrent insert of the same pair blocks on the unique index,
        // then falls through to the SELECT below once the winner commits
        let created = sqlx::query_as::<_, ChatEntity>(
            r#"
            INSERT INTO chats (id, kind, creator_id, max_participants, pair_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (pair_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(ChatKind::Private)
        .bind(user_a)
        .bind(PRIVATE_CHAT_SIZE)
        .bind(&pair_key)
        .fetch_optional(tx.as_mut())
        .await?;

        let result = match created {
            Some(chat) => {
                Self::insert_participant(&chat.id, user_a, ParticipantRole::Member, tx.as_mut())
                    .await?;
                Self::insert_participant(&chat.id, user_b, ParticipantRole::Member, tx.as_mut())
                    .await?;
                (chat, true)
            }
            None => {
                let chat =
                    sqlx::query_as::<_, ChatEntity>("SELECT * FROM chats WHERE pair_key = $1")
                        .bind(&pair_key)
                        .fetch_one(tx.as_mut())
                        .await?;
                (chat, false)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    async fn create_group(&self, group: &NewGroupChat) -> Result<ChatEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let chat = sqlx::query_as::<_, ChatEntity>(
            r#"
            INSERT INTO chats (id, kind, name, description, avatar_url, creator_id, max_participants)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(ChatKind::Group)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.avatar_url)
        .bind(group.creator_id)
        .bind(group.max_participants)
        .fetch_one(tx.as_mut())
        .await?;

        Self::insert_participant(&chat.id, &group.creator_id, ParticipantRole::Admin, tx.as_mut())
            .await?;

        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id, role)
            SELECT $1, member_id, 'member'
            FROM UNNEST($2::uuid[]) AS member_id
            "#,
        )
        .bind(chat.id)
        .bind(&group.member_ids)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(chat)
    }

    async fn soft_delete(&self, chat_id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            UPDATE chats
            SET deleted_at = NOW(), is_active = FALSE
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let participant = sqlx::query_as::<_, ChatParticipantEntity>(
            r#"
            SELECT * FROM chat_participants
            WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn find_participants(
        &self,
        chat_id: &Uuid,
    ) -> Result<Vec<ChatParticipantEntity>, error::SystemError> {
        let participants = sqlx::query_as::<_, ChatParticipantEntity>(
            r#"
            SELECT * FROM chat_participants
            WHERE chat_id = $1 AND left_at IS NULL
            ORDER BY joined_at ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn add_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        role: ParticipantRole,
    ) -> Result<ParticipantAdded, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        // concurrent adds to the same chat queue here until this transaction ends
        let max_participants = sqlx::query_scalar::<_, i32>(
            "SELECT max_participants FROM chats WHERE id = $1 FOR UPDATE",
        )
        .bind(chat_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or_else(|| error::SystemError::not_found("Chat not found"))?;

        let (active, already) = sqlx::query_as::<_, (i64, bool)>(
            r#"
            SELECT COUNT(*), COALESCE(BOOL_OR(user_id = $2), FALSE)
            FROM chat_participants
            WHERE chat_id = $1 AND left_at IS NULL
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(tx.as_mut())
        .await?;

        if already {
            return Ok(ParticipantAdded::AlreadyActive);
        }
        if active >= i64::from(max_participants) {
            return Ok(ParticipantAdded::Full);
        }

        // a previously left row is reactivated with fresh pivot state
        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (chat_id, user_id) DO UPDATE
            SET left_at = NULL,
                joined_at = NOW(),
                role = EXCLUDED.role,
                muted_until = NULL,
                last_read_message_id = NULL,
                is_archived = FALSE,
                is_pinned = FALSE
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(role)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(ParticipantAdded::Added)
    }

    async fn remove_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_participants
            SET left_at = NOW()
            WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn advance_read_position(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        message_id: i64,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let participant = sqlx::query_as::<_, ChatParticipantEntity>(
            r#"
            UPDATE chat_participants
            SET last_read_message_id = $3
            WHERE chat_id = $1
            AND user_id = $2
            AND left_at IS NULL
            AND (last_read_message_id IS NULL OR last_read_message_id < $3)
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn update_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        update: &ParticipantUpdate,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let participant = sqlx::query_as::<_, ChatParticipantEntity>(
            r#"
            UPDATE chat_participants
            SET muted_until = CASE WHEN $3 THEN $4 ELSE muted_until END,
                is_archived = COALESCE($5, is_archived),
                is_pinned = COALESCE($6, is_pinned)
            WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(update.muted_until.is_some())
        .bind(update.muted_until.flatten())
        .bind(update.is_archived)
        .bind(update.is_pinned)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn find_chats_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<UserChatRow>, error::SystemError> {
        let rows = sqlx::query_as::<_, UserChatRow>(
            r#"
            SELECT c.*, p.*
            FROM chats c
            JOIN chat_participants p ON p.chat_id = c.id
            WHERE p.user_id = $1
            AND p.left_at IS NULL
            AND c.deleted_at IS NULL
            ORDER BY p.is_pinned DESC, c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
