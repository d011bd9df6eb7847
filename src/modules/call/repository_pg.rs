use uuid::Uuid;

use crate::{
    api::error,
    modules::call::{
        model::NewCall,
        repository::CallRepository,
        schema::{
            CallEntity, CallParticipantEntity, CallParticipantStatus, CallStatus, CallTransition,
        },
    },
};

#[derive(Clone)]
pub struct CallRepositoryPg {
    pool: sqlx::PgPool,
}

impl CallRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallRepository for CallRepositoryPg {
    async fn create_call(
        &self,
        call: &NewCall,
        participants: &[(Uuid, CallParticipantStatus)],
    ) -> Result<CallEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, CallEntity>(
            r#"
            INSERT INTO calls (id, chat_id, caller_id, receiver_id, call_type, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(call.chat_id)
        .bind(call.caller_id)
        .bind(call.receiver_id)
        .bind(call.call_type)
        .bind(CallStatus::Ringing)
        .fetch_one(tx.as_mut())
        .await?;

        for (user_id, status) in participants {
            let joined_at = match status {
                CallParticipantStatus::Joined => Some(created.created_at),
                _ => None,
            };
            sqlx::query(
                r#"
                INSERT INTO call_participants (call_id, user_id, status, joined_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(created.id)
            .bind(user_id)
            .bind(status)
            .bind(joined_at)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn find_call(&self, id: &Uuid) -> Result<Option<CallEntity>, error::SystemError> {
        let call = sqlx::query_as::<_, CallEntity>("SELECT * FROM calls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(call)
    }

    async fn find_active_for_chat(
        &self,
        chat_id: &Uuid,
    ) -> Result<Option<CallEntity>, error::SystemError> {
        let call = sqlx::query_as::<_, CallEntity>(
            r#"
            SELECT * FROM calls
            WHERE chat_id = $1 AND status IN ('ringing', 'answered')
            LIMIT 1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(call)
    }

    async fn find_stale_ringing(
        &self,
        created_before: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CallEntity>, error::SystemError> {
        let calls = sqlx::query_as::<_, CallEntity>(
            r#"
            SELECT * FROM calls
            WHERE status = 'ringing' AND created_at <= $1
            ORDER BY created_at, id
            "#,
        )
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(calls)
    }

    async fn apply_transition(
        &self,
        id: &Uuid,
        transition: &CallTransition,
    ) -> Result<Option<CallEntity>, error::SystemError> {
        let call = sqlx::query_as::<_, CallEntity>(
            r#"
            UPDATE calls
            SET status = $3,
                started_at = COALESCE($4, started_at),
                answered_at = COALESCE($5, answered_at),
                ended_at = COALESCE($6, ended_at),
                duration = COALESCE($7, duration)
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(transition.expected)
        .bind(transition.to)
        .bind(transition.started_at)
        .bind(transition.answered_at)
        .bind(transition.ended_at)
        .bind(transition.duration)
        .fetch_optional(&self.pool)
        .await?;
        Ok(call)
    }

    async fn find_call_participants(
        &self,
        call_id: &Uuid,
    ) -> Result<Vec<CallParticipantEntity>, error::SystemError> {
        let participants = sqlx::query_as::<_, CallParticipantEntity>(
            "SELECT * FROM call_participants WHERE call_id = $1",
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    async fn find_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError> {
        let participant = sqlx::query_as::<_, CallParticipantEntity>(
            "SELECT * FROM call_participants WHERE call_id = $1 AND user_id = $2",
        )
        .bind(call_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn update_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
        expected: CallParticipantStatus,
        to: CallParticipantStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError> {
        let (joined_at, left_at) = match to {
            CallParticipantStatus::Joined => (Some(now), None),
            CallParticipantStatus::Ringing => (None, None),
            _ => (None, Some(now)),
        };

        let participant = sqlx::query_as::<_, CallParticipantEntity>(
            r#"
            UPDATE call_participants
            SET status = $4,
                joined_at = COALESCE($5, joined_at),
                left_at = COALESCE($6, left_at)
            WHERE call_id = $1 AND user_id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(call_id)
        .bind(user_id)
        .bind(expected)
        .bind(to)
        .bind(joined_at)
        .bind(left_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(participant)
    }

    async fn finish_participants(
        &self,
        call_id: &Uuid,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError> {
        let result = sqlx::query(
            r#"
            UPDATE call_participants
            SET status = CASE status
                    WHEN 'ringing' THEN 'missed'::call_participant_status
                    ELSE 'left'::call_participant_status
                END,
                left_at = $2
            WHERE call_id = $1 AND status IN ('ringing', 'joined')
            "#,
        )
        .bind(call_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_calls_for_user(
        &self,
        user_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CallEntity>, error::SystemError> {
        let calls = sqlx::query_as::<_, CallEntity>(
            r#"
            SELECT c.* FROM calls c
            WHERE c.chat_id IN (
                SELECT chat_id FROM chat_participants
                WHERE user_id = $1 AND left_at IS NULL
            )
            OR EXISTS (
                SELECT 1 FROM call_participants cp
                WHERE cp.call_id = c.id AND cp.user_id = $1
            )
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(calls)
    }
}
