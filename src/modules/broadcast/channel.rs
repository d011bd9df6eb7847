use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::{api::error, modules::chat::repository::ChatRepository};

const USER_PREFIX: &str = "private-user.";
const CHAT_PREFIX: &str = "private-chat.";
const CALL_PREFIX: &str = "call.";

/// Pub/sub channel a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Per-user inbox: new messages, chat membership, status posts.
    User(Uuid),
    /// Per-chat stream: read receipts, edits, deletions, reactions.
    Chat(Uuid),
    /// Per-user call signaling.
    Call(Uuid),
}

impl Channel {
    pub fn name(&self) -> String {
        match self {
            Channel::User(id) => format!("{USER_PREFIX}{id}"),
            Channel::Chat(id) => format!("{CHAT_PREFIX}{id}"),
            Channel::Call(id) => format!("{CALL_PREFIX}{id}"),
        }
    }

    pub fn parse(name: &str) -> Option<Channel> {
        if let Some(id) = name.strip_prefix(USER_PREFIX) {
            return Uuid::parse_str(id).ok().map(Channel::User);
        }
        if let Some(id) = name.strip_prefix(CHAT_PREFIX) {
            return Uuid::parse_str(id).ok().map(Channel::Chat);
        }
        if let Some(id) = name.strip_prefix(CALL_PREFIX) {
            return Uuid::parse_str(id).ok().map(Channel::Call);
        }
        None
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Channel::User(_) | Channel::Chat(_))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Decides whether a user may subscribe to a channel.
#[async_trait::async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    async fn can_subscribe(
        &self,
        user_id: Uuid,
        channel: &Channel,
    ) -> Result<bool, error::SystemError>;
}

/// User and call channels belong to their user; chat channels to the chat's active participants.
pub struct ParticipantChannelAuthorizer<C>
where
    C: ChatRepository + Send + Sync,
{
    chat_repo: Arc<C>,
}

impl<C> ParticipantChannelAuthorizer<C>
where
    C: ChatRepository + Send + Sync,
{
    pub fn new(chat_repo: Arc<C>) -> Self {
        Self { chat_repo }
    }
}

#[async_trait::async_trait]
impl<C> ChannelAuthorizer for ParticipantChannelAuthorizer<C>
where
    C: ChatRepository + Send + Sync,
{
    async fn can_subscribe(
        &self,
        user_id: Uuid,
        channel: &Channel,
    ) -> Result<bool, error::SystemError> {
        match channel {
            Channel::User(owner) | Channel::Call(owner) => Ok(*owner == user_id),
            Channel::Chat(chat_id) => {
                Ok(self.chat_repo.find_participant(chat_id, &user_id).await?.is_some())
            }
        }
    }
}
