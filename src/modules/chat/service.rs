use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        broadcast::{channel::Channel, event, notifier::Notifier},
        chat::{
            model::{
                ChatDetail, ChatSummary, NewChatRequest, NewGroupChat, ParticipantAdded,
                ParticipantDetail, ParticipantUpdate, ReadPosition,
            },
            repository::ChatRepository,
            schema::{
                ChatEntity, ChatKind, ChatParticipantEntity, ParticipantRole,
                DEFAULT_GROUP_MAX_PARTICIPANTS,
            },
        },
        message::repository::MessageRepository,
        user::repository::UserRepository,
    },
};

#[derive(Clone)]
pub struct ChatService<C, M, U>
where
    C: ChatRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    chat_repo: Arc<C>,
    message_repo: Arc<M>,
    user_repo: Arc<U>,
    notifier: Arc<Notifier>,
}

impl<C, M, U> ChatService<C, M, U>
where
    C: ChatRepository + Send + Sync + 'static,
    M: MessageRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        chat_repo: Arc<C>,
        message_repo: Arc<M>,
        user_repo: Arc<U>,
        notifier: Arc<Notifier>,
    ) -> Self {
        ChatService { chat_repo, message_repo, user_repo, notifier }
    }

    pub async fn create_chat(
        &self,
        user_id: Uuid,
        request: NewChatRequest,
    ) -> Result<ChatDetail, error::SystemError> {
        match request.kind {
            ChatKind::Private => {
                let other = request.participant_id.ok_or_else(|| {
                    error::SystemError::bad_request("participant_id is required for a private chat")
                })?;
                self.get_or_create_private_chat(user_id, other).await
            }
            ChatKind::Group => {
                let name = request
                    .name
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| error::SystemError::bad_request("Group name is required"))?;
                self.create_group_chat(NewGroupChat {
                    creator_id: user_id,
                    name,
                    description: request.description,
                    avatar_url: request.avatar_url,
                    member_ids: request.member_ids,
                    max_participants: request
                        .max_participants
                        .unwrap_or(DEFAULT_GROUP_MAX_PARTICIPANTS),
                })
                .await
            }
        }
    }

    /// Same chat for either argument order; safe under concurrent calls.
    pub async fn get_or_create_private_chat(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> Result<ChatDetail, error::SystemError> {
        let (chat, _) = self.find_or_create_private(user_id, other_id).await?;
        self.get_chat(chat.id, user_id).await
    }

    pub(crate) async fn find_or_create_private(
        &self,
        user_id: Uuid,
        other_id: Uuid,
    ) -> Result<(ChatEntity, bool), error::SystemError> {
        if user_id == other_id {
            return Err(error::SystemError::bad_request("Cannot start a chat with yourself"));
        }

        if !self.user_repo.exists(&other_id).await? {
            return Err(error::SystemError::not_found("User not found"));
        }

        let (chat, created) = self.chat_repo.find_or_create_private(&user_id, &other_id).await?;

        if created {
            log::info!("Private chat {} created between {} and {}", chat.id, user_id, other_id);
            self.notifier
                .notify_many(
                    &[Channel::User(user_id), Channel::User(other_id)],
                    event::CHAT_CREATED,
                    &chat,
                )
                .await;
        }

        Ok((chat, created))
    }

    pub async fn create_group_chat(
        &self,
        mut group: NewGroupChat,
    ) -> Result<ChatDetail, error::SystemError> {
        group.member_ids.sort();
        group.member_ids.dedup();
        group.member_ids.retain(|id| *id != group.creator_id);

        let total = group.member_ids.len() as i32 + 1;
        if total < 2 {
            return Err(error::SystemError::bad_request(
                "A group chat needs at least one other member",
            ));
        }
        if total > group.max_participants {
            return Err(error::SystemError::bad_request(format!(
                "A group chat can have at most {} participants",
                group.max_participants
            )));
        }

        let found = self.user_repo.find_summaries(&group.member_ids).await?;
        if found.len() != group.member_ids.len() {
            return Err(error::SystemError::not_found("One or more members do not exist"));
        }

        let chat = self.chat_repo.create_group(&group).await?;
        log::info!("Group chat {} created by {} with {} participants", chat.id, group.creator_id, total);

        let channels: Vec<Channel> = std::iter::once(group.creator_id)
            .chain(group.member_ids.iter().copied())
            .map(Channel::User)
            .collect();
        self.notifier.notify_many(&channels, event::CHAT_CREATED, &chat).await;

        self.get_chat(chat.id, group.creator_id).await
    }

    pub async fn get_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<ChatDetail, error::SystemError> {
        let (chat, membership) = self.chat_repo.require_membership(&chat_id, &user_id).await?;
        let participants = self.participant_details(&chat_id).await?;
        Ok(ChatDetail { chat, participants, membership })
    }

    async fn participant_details(
        &self,
        chat_id: &Uuid,
    ) -> Result<Vec<ParticipantDetail>, error::SystemError> {
        let participants = self.chat_repo.find_participants(chat_id).await?;
        let ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
        let users: HashMap<Uuid, _> = self
            .user_repo
            .find_summaries(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(participants
            .into_iter()
            .filter_map(|p| {
                users.get(&p.user_id).cloned().map(|user| ParticipantDetail {
                    user,
                    role: p.role,
                    joined_at: p.joined_at,
                    last_read_message_id: p.last_read_message_id,
                })
            })
            .collect())
    }

    /// `Ok(false)` when the user already participates.
    pub async fn add_participant(
        &self,
        chat_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<bool, error::SystemError> {
        let (chat, actor) = self.chat_repo.require_membership(&chat_id, &actor_id).await?;

        if chat.kind == ChatKind::Private {
            return Err(error::SystemError::bad_request(
                "Private chats cannot take more participants",
            ));
        }
        if !actor.is_admin() {
            return Err(error::SystemError::forbidden("Only group admins can add participants"));
        }
        if !self.user_repo.exists(&user_id).await? {
            return Err(error::SystemError::not_found("User not found"));
        }

        match self.chat_repo.add_participant(&chat_id, &user_id, role).await? {
            ParticipantAdded::AlreadyActive => Ok(false),
            ParticipantAdded::Full => Err(error::SystemError::bad_request(format!(
                "Group chat is full ({} participants)",
                chat.max_participants
            ))),
            ParticipantAdded::Added => {
                log::info!("User {} added to chat {} by {}", user_id, chat_id, actor_id);
                let payload =
                    serde_json::json!({ "chat_id": chat_id, "user_id": user_id, "role": role });
                self.notifier
                    .notify_many(
                        &[Channel::Chat(chat_id), Channel::User(user_id)],
                        event::CHAT_PARTICIPANT_ADDED,
                        &payload,
                    )
                    .await;
                Ok(true)
            }
        }
    }

    /// Admins remove anyone; everyone else may only leave.
    pub async fn remove_participant(
        &self,
        chat_id: Uuid,
        actor_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let (chat, actor) = self.chat_repo.require_membership(&chat_id, &actor_id).await?;

        if chat.kind == ChatKind::Private {
            return Err(error::SystemError::bad_request(
                "Participants cannot leave a private chat",
            ));
        }
        if actor_id != user_id && !actor.is_admin() {
            return Err(error::SystemError::forbidden("Only group admins can remove participants"));
        }

        if !self.chat_repo.remove_participant(&chat_id, &user_id).await? {
            return Err(error::SystemError::not_found("Participant not found"));
        }

        log::info!("User {} removed from chat {} by {}", user_id, chat_id, actor_id);
        let payload = serde_json::json!({ "chat_id": chat_id, "user_id": user_id });
        self.notifier
            .notify_many(
                &[Channel::Chat(chat_id), Channel::User(user_id)],
                event::CHAT_PARTICIPANT_REMOVED,
                &payload,
            )
            .await;
        self.notifier.revoke(&Channel::Chat(chat_id), user_id).await;
        Ok(())
    }

    /// Moves the read position forward; an older id leaves it untouched.
    pub async fn mark_as_read(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        message_id: Option<i64>,
    ) -> Result<ReadPosition, error::SystemError> {
        let (_, membership) = self.chat_repo.require_membership(&chat_id, &user_id).await?;

        let target = match message_id {
            Some(id) => {
                let message = self
                    .message_repo
                    .find_by_id(id)
                    .await?
                    .filter(|m| m.chat_id == chat_id)
                    .ok_or_else(|| error::SystemError::not_found("Message not found"))?;
                Some(message.id)
            }
            None => self.message_repo.find_latest(&chat_id).await?.map(|m| m.id),
        };

        let mut last_read = membership.last_read_message_id;

        if let Some(target) = target {
            match self.chat_repo.advance_read_position(&chat_id, &user_id, target).await? {
                Some(updated) => {
                    last_read = updated.last_read_message_id;
                    let payload = serde_json::json!({
                        "chat_id": chat_id,
                        "user_id": user_id,
                        "last_read_message_id": last_read,
                    });
                    self.notifier.notify(&Channel::Chat(chat_id), event::CHAT_READ, &payload).await;
                }
                None => {
                    log::debug!(
                        "Read position of {} in {} not moved to {} (already at {:?})",
                        user_id,
                        chat_id,
                        target,
                        last_read
                    );
                }
            }
        }

        let unread_count = self.message_repo.count_unread(&chat_id, &user_id, last_read).await?;

        Ok(ReadPosition { chat_id, user_id, last_read_message_id: last_read, unread_count })
    }

    pub async fn get_unread_count(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, error::SystemError> {
        let (_, membership) = self.chat_repo.require_membership(&chat_id, &user_id).await?;
        self.message_repo
            .count_unread(&chat_id, &user_id, membership.last_read_message_id)
            .await
    }

    async fn update_membership(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        update: ParticipantUpdate,
    ) -> Result<ChatParticipantEntity, error::SystemError> {
        self.chat_repo.require_membership(&chat_id, &user_id).await?;
        self.chat_repo
            .update_participant(&chat_id, &user_id, &update)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Participant not found"))
    }

    pub async fn mute_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<ChatParticipantEntity, error::SystemError> {
        if until.is_some_and(|u| u <= chrono::Utc::now()) {
            return Err(error::SystemError::bad_request("Mute end must be in the future"));
        }
        let update = ParticipantUpdate { muted_until: Some(until), ..Default::default() };
        self.update_membership(chat_id, user_id, update).await
    }

    pub async fn archive_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        archived: bool,
    ) -> Result<ChatParticipantEntity, error::SystemError> {
        let update = ParticipantUpdate { is_archived: Some(archived), ..Default::default() };
        self.update_membership(chat_id, user_id, update).await
    }

    pub async fn pin_chat(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        pinned: bool,
    ) -> Result<ChatParticipantEntity, error::SystemError> {
        let update = ParticipantUpdate { is_pinned: Some(pinned), ..Default::default() };
        self.update_membership(chat_id, user_id, update).await
    }

    /// Pinned chats first, then by most recent activity.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ChatSummary>, error::SystemError> {
        let rows = self.chat_repo.find_chats_for_user(&user_id).await?;
        let now = chrono::Utc::now();

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let last_message = self.message_repo.find_latest(&row.chat.id).await?;
            let unread_count = self
                .message_repo
                .count_unread(&row.chat.id, &user_id, row.membership.last_read_message_id)
                .await?;

            summaries.push(ChatSummary {
                is_muted: row.membership.is_muted_at(now),
                chat: row.chat,
                membership: row.membership,
                unread_count,
                last_message: last_message.map(Into::into),
            });
        }

        summaries.sort_by(|a, b| {
            let activity = |s: &ChatSummary| match &s.last_message {
                Some(m) => (m.sent_at, m.id),
                None => (s.chat.created_at, 0),
            };
            b.membership
                .is_pinned
                .cmp(&a.membership.is_pinned)
                .then_with(|| activity(b).cmp(&activity(a)))
        });

        Ok(summaries)
    }

    pub async fn delete_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<(), error::SystemError> {
        let (chat, membership) = self.chat_repo.require_membership(&chat_id, &user_id).await?;

        if chat.kind != ChatKind::Group {
            return Err(error::SystemError::bad_request("Only group chats can be deleted"));
        }
        if !membership.is_admin() {
            return Err(error::SystemError::forbidden("Only group admins can delete the chat"));
        }

        self.chat_repo.soft_delete(&chat_id).await?;
        log::info!("Group chat {} deleted by {}", chat_id, user_id);
        Ok(())
    }
}
