use uuid::Uuid;

use crate::{
    api::error,
    modules::call::{
        model::NewCall,
        schema::{CallEntity, CallParticipantEntity, CallParticipantStatus, CallTransition},
    },
};

#[async_trait::async_trait]
pub trait CallRepository {
    /// Inserts the call and its participant rows in one transaction.
    async fn create_call(
        &self,
        call: &NewCall,
        participants: &[(Uuid, CallParticipantStatus)],
    ) -> Result<CallEntity, error::SystemError>;

    async fn find_call(&self, id: &Uuid) -> Result<Option<CallEntity>, error::SystemError>;

    /// Ringing or answered call of the chat.
    async fn find_active_for_chat(
        &self,
        chat_id: &Uuid,
    ) -> Result<Option<CallEntity>, error::SystemError>;

    /// Calls still ringing that were created at or before `created_before`, oldest first.
    async fn find_stale_ringing(
        &self,
        created_before: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CallEntity>, error::SystemError>;

    /// Applies the transition only while the row still has `transition.expected`.
    async fn apply_transition(
        &self,
        id: &Uuid,
        transition: &CallTransition,
    ) -> Result<Option<CallEntity>, error::SystemError>;

    async fn find_call_participants(
        &self,
        call_id: &Uuid,
    ) -> Result<Vec<CallParticipantEntity>, error::SystemError>;

    async fn find_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError>;

    /// Compare-and-swap on the participant status; stamps `joined_at` or `left_at`.
    async fn update_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
        expected: CallParticipantStatus,
        to: CallParticipantStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError>;

    /// Ringing participants become missed, joined ones left.
    async fn finish_participants(
        &self,
        call_id: &Uuid,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError>;

    /// Calls of every chat the user is in plus calls they took part in, newest first.
    async fn find_calls_for_user(
        &self,
        user_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CallEntity>, error::SystemError>;
}
