use uuid::Uuid;

use crate::{
    api::error,
    modules::chat::{
        model::{NewGroupChat, ParticipantAdded, ParticipantUpdate, UserChatRow},
        schema::{ChatEntity, ChatParticipantEntity, ParticipantRole},
    },
};

#[async_trait::async_trait]
pub trait ChatRepository {
    /// Active (not soft-deleted) chat by id.
    async fn find_by_id(&self, chat_id: &Uuid) -> Result<Option<ChatEntity>, error::SystemError>;

    /// Returns the private chat of the pair, creating it (with both participants)
    /// when absent. The flag is `true` when this call created it.
    async fn find_or_create_private(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<(ChatEntity, bool), error::SystemError>;

    async fn create_group(&self, group: &NewGroupChat) -> Result<ChatEntity, error::SystemError>;

    async fn soft_delete(&self, chat_id: &Uuid) -> Result<bool, error::SystemError>;

    /// Active participant row.
    async fn find_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError>;

    async fn find_participants(
        &self,
        chat_id: &Uuid,
    ) -> Result<Vec<ChatParticipantEntity>, error::SystemError>;

    /// Checks capacity and inserts in one transaction holding the chat row lock.
    async fn add_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        role: ParticipantRole,
    ) -> Result<ParticipantAdded, error::SystemError>;

    async fn remove_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    /// Moves `last_read_message_id` forward only. `None` when the row did not move.
    async fn advance_read_position(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        message_id: i64,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError>;

    async fn update_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        update: &ParticipantUpdate,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError>;

    async fn find_chats_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<UserChatRow>, error::SystemError>;

    /// Chat plus the user's membership, or NotFound / Forbidden.
    async fn require_membership(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<(ChatEntity, ChatParticipantEntity), error::SystemError> {
        let chat = self
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Chat not found"))?;

        let participant = self
            .find_participant(chat_id, user_id)
            .await?
            .ok_or_else(|| error::SystemError::forbidden("You are not a participant of this chat"))?;

        Ok((chat, participant))
    }
}
