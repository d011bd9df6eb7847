use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{
        model::InsertMessage,
        schema::{MessageEntity, MessageReactionEntity, StatusUpdate},
    },
};

#[async_trait::async_trait]
pub trait MessageRepository {
    async fn create(&self, message: &InsertMessage) -> Result<MessageEntity, error::SystemError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError>;

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<MessageEntity>, error::SystemError>;

    /// Newest first, ids strictly below `before` when given.
    async fn find_page(
        &self,
        chat_id: &Uuid,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    async fn find_latest(&self, chat_id: &Uuid)
        -> Result<Option<MessageEntity>, error::SystemError>;

    /// Messages from other senders with an id above `after` (all of them when `None`).
    async fn count_unread(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        after: Option<i64>,
    ) -> Result<i64, error::SystemError>;

    /// Compare-and-swap on the status column; `None` when another writer got there first.
    async fn advance_status(
        &self,
        id: i64,
        update: &StatusUpdate,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    async fn edit(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    async fn soft_delete(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Inserts or replaces the user's reaction on the message.
    async fn upsert_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<MessageReactionEntity, error::SystemError>;

    async fn delete_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError>;

    async fn find_reactions(
        &self,
        message_id: i64,
    ) -> Result<Vec<MessageReactionEntity>, error::SystemError>;
}
