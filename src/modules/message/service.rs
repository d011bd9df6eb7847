/// Message Service
///
/// Message lifecycle inside a chat:
/// - sending with per-kind payload rules and reply threading
/// - forward-only delivery state (`Sent -> Delivered -> Read`)
/// - edits, soft deletion and reactions
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        broadcast::{channel::Channel, event, notifier::Notifier},
        chat::{repository::ChatRepository, schema::ChatParticipantEntity},
        message::{
            model::{
                summarize_reactions, GetMessageResponse, InsertMessage, MessageView,
                ReactionChangedPayload, ReactionSummary, ReplyPreview, SendMessageRequest,
                StatusChangedPayload, DEFAULT_PAGE_SIZE,
            },
            repository::MessageRepository,
            schema::{MessageEntity, MessageKind, MessageStatus},
        },
    },
};

#[derive(Clone)]
pub struct MessageService<M, C>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ChatRepository + Send + Sync + 'static,
{
    message_repo: Arc<M>,
    chat_repo: Arc<C>,
    notifier: Arc<Notifier>,
}

impl<M, C> MessageService<M, C>
where
    M: MessageRepository + Send + Sync + 'static,
    C: ChatRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(message_repo: Arc<M>, chat_repo: Arc<C>, notifier: Arc<Notifier>) -> Self {
        MessageService { message_repo, chat_repo, notifier }
    }

    /// Message plus the caller's membership in its chat.
    async fn load_for_participant(
        &self,
        message_id: i64,
        user_id: &Uuid,
    ) -> Result<(MessageEntity, ChatParticipantEntity), error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        let (_, participant) = self.chat_repo.require_membership(&message.chat_id, user_id).await?;
        Ok((message, participant))
    }

    pub async fn send(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        request: SendMessageRequest,
    ) -> Result<MessageView, error::SystemError> {
        request.validate_payload()?;
        self.chat_repo.require_membership(&chat_id, &sender_id).await?;

        let reply_to = match request.reply_to_message_id {
            Some(reply_id) => {
                let original = self
                    .message_repo
                    .find_by_id(reply_id)
                    .await?
                    .filter(|m| m.chat_id == chat_id)
                    .ok_or_else(|| {
                        error::SystemError::bad_request("Replied message does not belong to this chat")
                    })?;
                Some(ReplyPreview::from(&original))
            }
            None => None,
        };

        let message = self
            .message_repo
            .create(&InsertMessage {
                chat_id,
                sender_id,
                reply_to_message_id: request.reply_to_message_id,
                kind: request.kind,
                content: request.content,
                media_ref: request.media_ref,
            })
            .await?;

        log::info!("Message {} sent to chat {} by {}", message.id, chat_id, sender_id);

        let view = MessageView::from(message).with_reply(reply_to);

        let recipients: Vec<Channel> = self
            .chat_repo
            .find_participants(&chat_id)
            .await?
            .into_iter()
            .filter(|p| p.user_id != sender_id)
            .map(|p| Channel::User(p.user_id))
            .collect();
        self.notifier.notify_many(&recipients, event::MESSAGE_CREATED, &view).await;

        Ok(view)
    }

    /// Newest page first; `next_cursor` is the id to pass for the previous page.
    pub async fn list(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        cursor: Option<i64>,
        limit: Option<i64>,
    ) -> Result<GetMessageResponse, error::SystemError> {
        self.chat_repo.require_membership(&chat_id, &user_id).await?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
        let mut messages = self.message_repo.find_page(&chat_id, cursor, limit + 1).await?;

        let next_cursor = if messages.len() as i64 > limit {
            messages.pop();
            messages.last().map(|m| m.id)
        } else {
            None
        };

        let reply_ids: Vec<i64> = messages.iter().filter_map(|m| m.reply_to_message_id).collect();
        let replies: HashMap<i64, ReplyPreview> = self
            .message_repo
            .find_by_ids(&reply_ids)
            .await?
            .iter()
            .map(|m| (m.id, ReplyPreview::from(m)))
            .collect();

        messages.reverse();
        let messages = messages
            .into_iter()
            .map(|m| {
                let reply = m.reply_to_message_id.and_then(|id| replies.get(&id).cloned());
                MessageView::from(m).with_reply(reply)
            })
            .collect();

        Ok(GetMessageResponse { messages, next_cursor })
    }

    pub async fn mark_as_delivered(
        &self,
        message_id: i64,
        user_id: Uuid,
    ) -> Result<MessageView, error::SystemError> {
        self.advance_status(message_id, user_id, MessageStatus::Delivered).await
    }

    pub async fn mark_as_read(
        &self,
        message_id: i64,
        user_id: Uuid,
    ) -> Result<MessageView, error::SystemError> {
        self.advance_status(message_id, user_id, MessageStatus::Read).await
    }

    /// A status already at or past `target` is returned unchanged.
    async fn advance_status(
        &self,
        message_id: i64,
        user_id: Uuid,
        target: MessageStatus,
    ) -> Result<MessageView, error::SystemError> {
        let (message, _) = self.load_for_participant(message_id, &user_id).await?;

        if message.sender_id == user_id {
            return Err(error::SystemError::forbidden(
                "The sender cannot acknowledge their own message",
            ));
        }

        let Some(update) = message.status_update(target, chrono::Utc::now()) else {
            log::debug!("Message {} already {:?}, {:?} ignored", message.id, message.status, target);
            return Ok(message.into());
        };

        let updated = match self.message_repo.advance_status(message_id, &update).await? {
            Some(updated) => updated,
            // lost the race to an equal or further transition
            None => self
                .message_repo
                .find_by_id(message_id)
                .await?
                .ok_or_else(|| error::SystemError::not_found("Message not found"))?,
        };

        if updated.status == target {
            let payload = StatusChangedPayload {
                message_id,
                chat_id: updated.chat_id,
                status: updated.status,
                user_id,
                delivered_at: updated.delivered_at,
                read_at: updated.read_at,
            };
            self.notifier
                .notify(&Channel::Chat(updated.chat_id), event::MESSAGE_STATUS, &payload)
                .await;
        }

        Ok(updated.into())
    }

    pub async fn edit(
        &self,
        message_id: i64,
        user_id: Uuid,
        content: String,
    ) -> Result<MessageView, error::SystemError> {
        let (message, _) = self.load_for_participant(message_id, &user_id).await?;

        if message.sender_id != user_id {
            return Err(error::SystemError::forbidden("Only the sender can edit a message"));
        }
        if message.kind != MessageKind::Text {
            return Err(error::SystemError::bad_request("Only text messages can be edited"));
        }
        if message.is_deleted {
            return Err(error::SystemError::invalid_state("Deleted messages cannot be edited"));
        }
        if content.trim().is_empty() {
            return Err(error::SystemError::bad_request("Message content cannot be empty"));
        }

        let updated: MessageView = self
            .message_repo
            .edit(message_id, &content)
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("Deleted messages cannot be edited"))?
            .into();

        self.notifier.notify(&Channel::Chat(updated.chat_id), event::MESSAGE_UPDATED, &updated).await;
        Ok(updated)
    }

    /// Content stays stored; renderings show a placeholder.
    pub async fn soft_delete(
        &self,
        message_id: i64,
        user_id: Uuid,
    ) -> Result<MessageView, error::SystemError> {
        let (message, participant) = self.load_for_participant(message_id, &user_id).await?;

        if message.sender_id != user_id && !participant.is_admin() {
            return Err(error::SystemError::forbidden("Only the sender can delete this message"));
        }
        if message.is_deleted {
            return Ok(message.into());
        }

        let deleted: MessageView = match self.message_repo.soft_delete(message_id).await? {
            Some(deleted) => deleted.into(),
            None => return Ok(message.into()),
        };

        log::info!("Message {} deleted by {}", message_id, user_id);
        self.notifier.notify(&Channel::Chat(deleted.chat_id), event::MESSAGE_DELETED, &deleted).await;
        Ok(deleted)
    }

    /// Reacting again replaces the user's previous emoji.
    pub async fn react(
        &self,
        message_id: i64,
        user_id: Uuid,
        emoji: String,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        let (message, _) = self.load_for_participant(message_id, &user_id).await?;

        if message.is_deleted {
            return Err(error::SystemError::invalid_state("Cannot react to a deleted message"));
        }

        self.message_repo.upsert_reaction(message_id, &user_id, emoji.trim()).await?;
        self.publish_reactions(&message, user_id).await
    }

    pub async fn remove_reaction(
        &self,
        message_id: i64,
        user_id: Uuid,
        emoji: String,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        let (message, _) = self.load_for_participant(message_id, &user_id).await?;

        if !self.message_repo.delete_reaction(message_id, &user_id, emoji.trim()).await? {
            return Err(error::SystemError::not_found("Reaction not found"));
        }
        self.publish_reactions(&message, user_id).await
    }

    async fn publish_reactions(
        &self,
        message: &MessageEntity,
        user_id: Uuid,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        let reactions = summarize_reactions(&self.message_repo.find_reactions(message.id).await?);
        let payload = ReactionChangedPayload {
            message_id: message.id,
            chat_id: message.chat_id,
            user_id,
            reactions: reactions.clone(),
        };
        self.notifier.notify(&Channel::Chat(message.chat_id), event::MESSAGE_REACTION, &payload).await;
        Ok(reactions)
    }

    pub async fn reaction_summary(
        &self,
        message_id: i64,
        user_id: Uuid,
    ) -> Result<Vec<ReactionSummary>, error::SystemError> {
        self.load_for_participant(message_id, &user_id).await?;
        Ok(summarize_reactions(&self.message_repo.find_reactions(message_id).await?))
    }
}
