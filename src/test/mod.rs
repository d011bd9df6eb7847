//! In-memory stand-ins for the Postgres repositories, the broadcast backend
//! and the settings cache. One `MemoryStore` implements every repository
//! trait so a service under test can share state across modules.
//!
//! Writes follow the SQL in the `*_pg.rs` files: compare-and-swap updates
//! only touch rows still in the expected state and unique constraints
//! surface as `SystemError::Conflict` with the same constraint names.
use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        broadcast::notifier::Broadcaster,
        call::{
            model::NewCall,
            repository::CallRepository,
            schema::{
                CallEntity, CallParticipantEntity, CallParticipantStatus, CallStatus,
                CallTransition,
            },
        },
        chat::{
            model::{NewGroupChat, ParticipantAdded, ParticipantUpdate, UserChatRow},
            repository::ChatRepository,
            schema::{
                private_pair_key, ChatEntity, ChatKind, ChatParticipantEntity, ParticipantRole,
                PRIVATE_CHAT_SIZE,
            },
        },
        contact::{repository::ContactRepository, schema::ContactEntity},
        message::{
            model::InsertMessage,
            repository::MessageRepository,
            schema::{MessageEntity, MessageReactionEntity, MessageStatus, StatusUpdate},
        },
        setting::{
            cache::SettingsCache,
            repository::SettingRepository,
            schema::{Setting, SettingRow, SettingType},
        },
        status::{
            model::NewStatus,
            repository::StatusRepository,
            schema::{StatusEntity, StatusViewEntity},
        },
        user::{
            repository::UserRepository,
            schema::{UserEntity, UserRole, UserSummary},
        },
    },
};

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn unique_violation(constraint: &str) -> error::SystemError {
    error::SystemError::Conflict(Some(error::DbErrorMeta {
        code: Some("23505".into()),
        constraint: Some(constraint.into()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }))
}

#[derive(Default)]
struct State {
    users: Vec<UserEntity>,
    chats: Vec<ChatEntity>,
    chat_participants: Vec<ChatParticipantEntity>,
    messages: Vec<MessageEntity>,
    last_message_id: i64,
    reactions: Vec<MessageReactionEntity>,
    contacts: Vec<ContactEntity>,
    statuses: Vec<StatusEntity>,
    status_views: Vec<StatusViewEntity>,
    calls: Vec<CallEntity>,
    call_participants: Vec<CallParticipantEntity>,
    settings: BTreeMap<String, SettingRow>,
}

impl State {
    fn active_participant_mut(
        &mut self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Option<&mut ChatParticipantEntity> {
        self.chat_participants
            .iter_mut()
            .find(|p| p.chat_id == *chat_id && p.user_id == *user_id && p.is_active())
    }

    fn insert_participant(
        &mut self,
        chat_id: Uuid,
        user_id: Uuid,
        role: ParticipantRole,
    ) -> Result<(), error::SystemError> {
        if self.chat_participants.iter().any(|p| p.chat_id == chat_id && p.user_id == user_id) {
            return Err(unique_violation("chat_participants_pkey"));
        }
        self.chat_participants.push(ChatParticipantEntity::new(chat_id, user_id, role));
        Ok(())
    }

    fn call_participant_mut(
        &mut self,
        call_id: &Uuid,
        user_id: &Uuid,
    ) -> Option<&mut CallParticipantEntity> {
        self.call_participants.iter_mut().find(|p| p.call_id == *call_id && p.user_id == *user_id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, username: &str) -> Uuid {
        let user = UserEntity {
            id: Uuid::now_v7(),
            username: username.to_string(),
            display_name: username.to_string(),
            avatar_url: None,
            role: UserRole::User,
            deleted_at: None,
            created_at: now(),
        };
        let id = user.id;
        self.state.lock().await.users.push(user);
        id
    }

    pub async fn private_chat(&self, user_a: Uuid, user_b: Uuid) -> (ChatEntity, bool) {
        self.find_or_create_private(&user_a, &user_b).await.expect("private chat")
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<UserEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == *id && u.deleted_at.is_none()).cloned())
    }

    async fn find_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.id) && u.deleted_at.is_none())
            .cloned()
            .map(UserSummary::from)
            .collect())
    }
}

#[async_trait::async_trait]
impl ChatRepository for MemoryStore {
    async fn find_by_id(&self, chat_id: &Uuid) -> Result<Option<ChatEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.chats.iter().find(|c| c.id == *chat_id && c.deleted_at.is_none()).cloned())
    }

    async fn find_or_create_private(
        &self,
        user_a: &Uuid,
        user_b: &Uuid,
    ) -> Result<(ChatEntity, bool), error::SystemError> {
        let pair_key = private_pair_key(user_a, user_b);
        let mut state = self.state.lock().await;

        if let Some(chat) = state.chats.iter().find(|c| c.pair_key.as_deref() == Some(&pair_key)) {
            return Ok((chat.clone(), false));
        }

        let chat = ChatEntity {
            id: Uuid::now_v7(),
            kind: ChatKind::Private,
            name: None,
            description: None,
            avatar_url: None,
            creator_id: *user_a,
            max_participants: PRIVATE_CHAT_SIZE,
            is_active: true,
            pair_key: Some(pair_key),
            created_at: now(),
            deleted_at: None,
        };
        state.chats.push(chat.clone());
        state.insert_participant(chat.id, *user_a, ParticipantRole::Member)?;
        state.insert_participant(chat.id, *user_b, ParticipantRole::Member)?;
        Ok((chat, true))
    }

    async fn create_group(&self, group: &NewGroupChat) -> Result<ChatEntity, error::SystemError> {
        let mut state = self.state.lock().await;

        let chat = ChatEntity {
            id: Uuid::now_v7(),
            kind: ChatKind::Group,
            name: Some(group.name.clone()),
            description: group.description.clone(),
            avatar_url: group.avatar_url.clone(),
            creator_id: group.creator_id,
            max_participants: group.max_participants,
            is_active: true,
            pair_key: None,
            created_at: now(),
            deleted_at: None,
        };

        // the transaction rolls back as a whole on a duplicate member
        let snapshot = state.chat_participants.len();
        let mut inserted = state.insert_participant(chat.id, group.creator_id, ParticipantRole::Admin);
        for member in &group.member_ids {
            if inserted.is_err() {
                break;
            }
            inserted = state.insert_participant(chat.id, *member, ParticipantRole::Member);
        }
        if let Err(e) = inserted {
            state.chat_participants.truncate(snapshot);
            return Err(e);
        }

        state.chats.push(chat.clone());
        Ok(chat)
    }

    async fn soft_delete(&self, chat_id: &Uuid) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        match state.chats.iter_mut().find(|c| c.id == *chat_id && c.deleted_at.is_none()) {
            Some(chat) => {
                chat.deleted_at = Some(now());
                chat.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.active_participant_mut(chat_id, user_id).map(|p| p.clone()))
    }

    async fn find_participants(
        &self,
        chat_id: &Uuid,
    ) -> Result<Vec<ChatParticipantEntity>, error::SystemError> {
        let state = self.state.lock().await;
        let mut participants: Vec<_> = state
            .chat_participants
            .iter()
            .filter(|p| p.chat_id == *chat_id && p.is_active())
            .cloned()
            .collect();
        participants.sort_by_key(|p| p.joined_at);
        Ok(participants)
    }

    async fn add_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        role: ParticipantRole,
    ) -> Result<ParticipantAdded, error::SystemError> {
        let mut state = self.state.lock().await;
        let max_participants = state
            .chats
            .iter()
            .find(|c| c.id == *chat_id)
            .map(|c| c.max_participants)
            .ok_or_else(|| error::SystemError::not_found("Chat not found"))?;

        let active = state
            .chat_participants
            .iter()
            .filter(|p| p.chat_id == *chat_id && p.is_active())
            .collect::<Vec<_>>();
        if active.iter().any(|p| p.user_id == *user_id) {
            return Ok(ParticipantAdded::AlreadyActive);
        }
        if active.len() >= usize::try_from(max_participants).unwrap_or(0) {
            return Ok(ParticipantAdded::Full);
        }

        let fresh = ChatParticipantEntity::new(*chat_id, *user_id, role);
        match state
            .chat_participants
            .iter_mut()
            .find(|p| p.chat_id == *chat_id && p.user_id == *user_id)
        {
            Some(p) => *p = fresh,
            None => state.chat_participants.push(fresh),
        }
        Ok(ParticipantAdded::Added)
    }

    async fn remove_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        match state.active_participant_mut(chat_id, user_id) {
            Some(p) => {
                p.left_at = Some(now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn advance_read_position(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        message_id: i64,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state
            .active_participant_mut(chat_id, user_id)
            .filter(|p| p.last_read_message_id.map_or(true, |last| last < message_id))
            .map(|p| {
                p.last_read_message_id = Some(message_id);
                p.clone()
            }))
    }

    async fn update_participant(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        update: &ParticipantUpdate,
    ) -> Result<Option<ChatParticipantEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.active_participant_mut(chat_id, user_id).map(|p| {
            if let Some(muted_until) = update.muted_until {
                p.muted_until = muted_until;
            }
            if let Some(archived) = update.is_archived {
                p.is_archived = archived;
            }
            if let Some(pinned) = update.is_pinned {
                p.is_pinned = pinned;
            }
            p.clone()
        }))
    }

    async fn find_chats_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<UserChatRow>, error::SystemError> {
        let state = self.state.lock().await;
        let mut rows: Vec<UserChatRow> = state
            .chats
            .iter()
            .rev()
            .filter(|c| c.deleted_at.is_none())
            .filter_map(|chat| {
                state
                    .chat_participants
                    .iter()
                    .find(|p| p.chat_id == chat.id && p.user_id == *user_id && p.is_active())
                    .map(|membership| UserChatRow { chat: chat.clone(), membership: membership.clone() })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.membership
                .is_pinned
                .cmp(&a.membership.is_pinned)
                .then(b.chat.created_at.cmp(&a.chat.created_at))
        });
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: &InsertMessage) -> Result<MessageEntity, error::SystemError> {
        let mut state = self.state.lock().await;
        state.last_message_id += 1;

        let entity = MessageEntity {
            id: state.last_message_id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            reply_to_message_id: message.reply_to_message_id,
            kind: message.kind,
            content: message.content.clone(),
            media_ref: message.media_ref.clone(),
            status: MessageStatus::Sent,
            sent_at: now(),
            delivered_at: None,
            read_at: None,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
        };
        state.messages.push(entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<MessageEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
    }

    async fn find_page(
        &self,
        chat_id: &Uuid,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.chat_id == *chat_id && before.map_or(true, |b| m.id < b))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn find_latest(
        &self,
        chat_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().rev().find(|m| m.chat_id == *chat_id).cloned())
    }

    async fn count_unread(
        &self,
        chat_id: &Uuid,
        user_id: &Uuid,
        after: Option<i64>,
    ) -> Result<i64, error::SystemError> {
        let state = self.state.lock().await;
        let count = state
            .messages
            .iter()
            .filter(|m| {
                m.chat_id == *chat_id
                    && m.sender_id != *user_id
                    && after.map_or(true, |a| m.id > a)
            })
            .count();
        Ok(count as i64)
    }

    async fn advance_status(
        &self,
        id: i64,
        update: &StatusUpdate,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.iter_mut().find(|m| m.id == id && m.status < update.status).map(|m| {
            m.status = update.status;
            m.delivered_at = m.delivered_at.or(Some(update.delivered_at));
            m.read_at = m.read_at.or(update.read_at);
            m.clone()
        }))
    }

    async fn edit(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.iter_mut().find(|m| m.id == id && !m.is_deleted).map(|m| {
            m.content = Some(content.to_string());
            m.edited_at = Some(now());
            m.clone()
        }))
    }

    async fn soft_delete(&self, id: i64) -> Result<Option<MessageEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.messages.iter_mut().find(|m| m.id == id && !m.is_deleted).map(|m| {
            m.is_deleted = true;
            m.deleted_at = Some(now());
            m.clone()
        }))
    }

    async fn upsert_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<MessageReactionEntity, error::SystemError> {
        let mut state = self.state.lock().await;
        let id = match state
            .reactions
            .iter()
            .position(|r| r.message_id == message_id && r.user_id == *user_id)
        {
            Some(index) => state.reactions.remove(index).id,
            None => Uuid::now_v7(),
        };

        let reaction = MessageReactionEntity {
            id,
            message_id,
            user_id: *user_id,
            emoji: emoji.to_string(),
            created_at: now(),
        };
        state.reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn delete_reaction(
        &self,
        message_id: i64,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        let before = state.reactions.len();
        state
            .reactions
            .retain(|r| !(r.message_id == message_id && r.user_id == *user_id && r.emoji == emoji));
        Ok(state.reactions.len() < before)
    }

    async fn find_reactions(
        &self,
        message_id: i64,
    ) -> Result<Vec<MessageReactionEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.reactions.iter().filter(|r| r.message_id == message_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl ContactRepository for MemoryStore {
    async fn find_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<Option<ContactEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .contacts
            .iter()
            .find(|c| c.owner_id == *owner_id && c.contact_id == *contact_id)
            .cloned())
    }

    async fn find_contacts(&self, owner_id: &Uuid) -> Result<Vec<ContactEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.contacts.iter().rev().filter(|c| c.owner_id == *owner_id).cloned().collect())
    }

    async fn find_entries_about(
        &self,
        contact_id: &Uuid,
        owner_ids: &[Uuid],
    ) -> Result<Vec<ContactEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .contacts
            .iter()
            .filter(|c| c.contact_id == *contact_id && owner_ids.contains(&c.owner_id))
            .cloned()
            .collect())
    }

    async fn create_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        nickname: Option<&str>,
    ) -> Result<ContactEntity, error::SystemError> {
        let mut state = self.state.lock().await;
        if state.contacts.iter().any(|c| c.owner_id == *owner_id && c.contact_id == *contact_id) {
            return Err(unique_violation("contacts_owner_contact"));
        }

        let contact = ContactEntity {
            owner_id: *owner_id,
            contact_id: *contact_id,
            nickname: nickname.map(str::to_string),
            is_blocked: false,
            is_close_friend: false,
            created_at: now(),
        };
        state.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn delete_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        let before = state.contacts.len();
        state.contacts.retain(|c| !(c.owner_id == *owner_id && c.contact_id == *contact_id));
        Ok(state.contacts.len() < before)
    }

    async fn set_blocked(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        blocked: bool,
    ) -> Result<ContactEntity, error::SystemError> {
        let mut state = self.state.lock().await;
        if let Some(contact) = state
            .contacts
            .iter_mut()
            .find(|c| c.owner_id == *owner_id && c.contact_id == *contact_id)
        {
            contact.is_blocked = blocked;
            return Ok(contact.clone());
        }

        let contact = ContactEntity {
            owner_id: *owner_id,
            contact_id: *contact_id,
            nickname: None,
            is_blocked: blocked,
            is_close_friend: false,
            created_at: now(),
        };
        state.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn set_close_friend(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        close_friend: bool,
    ) -> Result<Option<ContactEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state
            .contacts
            .iter_mut()
            .find(|c| c.owner_id == *owner_id && c.contact_id == *contact_id)
            .map(|c| {
                c.is_close_friend = close_friend;
                c.clone()
            }))
    }
}

#[async_trait::async_trait]
impl StatusRepository for MemoryStore {
    async fn create_status(&self, status: &NewStatus) -> Result<StatusEntity, error::SystemError> {
        let entity = StatusEntity {
            id: Uuid::now_v7(),
            user_id: status.user_id,
            content_type: status.content_type,
            content: status.content.clone(),
            media_ref: status.media_ref.clone(),
            caption: status.caption.clone(),
            background_color: status.background_color.clone(),
            text_color: status.text_color.clone(),
            font_style: status.font_style.clone(),
            privacy: status.privacy,
            expires_at: status.expires_at,
            created_at: now(),
        };
        self.state.lock().await.statuses.push(entity.clone());
        Ok(entity)
    }

    async fn find_status(&self, id: &Uuid) -> Result<Option<StatusEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.statuses.iter().find(|s| s.id == *id).cloned())
    }

    async fn find_active_by_authors(
        &self,
        author_ids: &[Uuid],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<StatusEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .statuses
            .iter()
            .filter(|s| author_ids.contains(&s.user_id) && !s.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn has_viewed(&self, status_id: &Uuid, viewer_id: &Uuid) -> Result<bool, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.status_views.iter().any(|v| v.status_id == *status_id && v.viewer_id == *viewer_id))
    }

    async fn record_view(
        &self,
        status_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        if state.status_views.iter().any(|v| v.status_id == *status_id && v.viewer_id == *viewer_id)
        {
            return Ok(false);
        }
        state.status_views.push(StatusViewEntity {
            id: Uuid::now_v7(),
            status_id: *status_id,
            viewer_id: *viewer_id,
            viewed_at: now(),
        });
        Ok(true)
    }

    async fn count_views(&self, status_id: &Uuid) -> Result<i64, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.status_views.iter().filter(|v| v.status_id == *status_id).count() as i64)
    }

    async fn find_views(
        &self,
        status_id: &Uuid,
    ) -> Result<Vec<StatusViewEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.status_views.iter().rev().filter(|v| v.status_id == *status_id).cloned().collect())
    }

    async fn find_viewed_ids(
        &self,
        viewer_id: &Uuid,
        status_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .status_views
            .iter()
            .filter(|v| v.viewer_id == *viewer_id && status_ids.contains(&v.status_id))
            .map(|v| v.status_id)
            .collect())
    }

    async fn update_expiry(
        &self,
        id: &Uuid,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<StatusEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.statuses.iter_mut().find(|s| s.id == *id).map(|s| {
            s.expires_at = expires_at;
            s.clone()
        }))
    }

    async fn delete_status(&self, id: &Uuid) -> Result<bool, error::SystemError> {
        let mut state = self.state.lock().await;
        let before = state.statuses.len();
        state.statuses.retain(|s| s.id != *id);
        state.status_views.retain(|v| v.status_id != *id);
        Ok(state.statuses.len() < before)
    }

    async fn delete_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError> {
        let mut state = self.state.lock().await;
        let expired: Vec<Uuid> =
            state.statuses.iter().filter(|s| s.is_expired_at(now)).map(|s| s.id).collect();
        state.statuses.retain(|s| !expired.contains(&s.id));
        state.status_views.retain(|v| !expired.contains(&v.status_id));
        Ok(expired.len() as u64)
    }
}

#[async_trait::async_trait]
impl CallRepository for MemoryStore {
    async fn create_call(
        &self,
        call: &NewCall,
        participants: &[(Uuid, CallParticipantStatus)],
    ) -> Result<CallEntity, error::SystemError> {
        let mut state = self.state.lock().await;
        if state.calls.iter().any(|c| c.chat_id == call.chat_id && !c.status.is_terminal()) {
            return Err(unique_violation("calls_active_call"));
        }

        let created = CallEntity {
            id: Uuid::now_v7(),
            chat_id: call.chat_id,
            caller_id: call.caller_id,
            receiver_id: call.receiver_id,
            call_type: call.call_type,
            status: CallStatus::Ringing,
            started_at: None,
            answered_at: None,
            ended_at: None,
            duration: None,
            created_at: now(),
        };
        for (user_id, status) in participants {
            state.call_participants.push(CallParticipantEntity {
                call_id: created.id,
                user_id: *user_id,
                status: *status,
                joined_at: (*status == CallParticipantStatus::Joined).then_some(created.created_at),
                left_at: None,
            });
        }
        state.calls.push(created.clone());
        Ok(created)
    }

    async fn find_call(&self, id: &Uuid) -> Result<Option<CallEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.calls.iter().find(|c| c.id == *id).cloned())
    }

    async fn find_active_for_chat(
        &self,
        chat_id: &Uuid,
    ) -> Result<Option<CallEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.calls.iter().find(|c| c.chat_id == *chat_id && !c.status.is_terminal()).cloned())
    }

    async fn find_stale_ringing(
        &self,
        created_before: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CallEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state
            .calls
            .iter()
            .filter(|c| c.status == CallStatus::Ringing && c.created_at <= created_before)
            .cloned()
            .collect())
    }

    async fn apply_transition(
        &self,
        id: &Uuid,
        transition: &CallTransition,
    ) -> Result<Option<CallEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state
            .calls
            .iter_mut()
            .find(|c| c.id == *id && c.status == transition.expected)
            .map(|c| {
                c.status = transition.to;
                c.started_at = transition.started_at.or(c.started_at);
                c.answered_at = transition.answered_at.or(c.answered_at);
                c.ended_at = transition.ended_at.or(c.ended_at);
                c.duration = transition.duration.or(c.duration);
                c.clone()
            }))
    }

    async fn find_call_participants(
        &self,
        call_id: &Uuid,
    ) -> Result<Vec<CallParticipantEntity>, error::SystemError> {
        let state = self.state.lock().await;
        Ok(state.call_participants.iter().filter(|p| p.call_id == *call_id).cloned().collect())
    }

    async fn find_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.call_participant_mut(call_id, user_id).map(|p| p.clone()))
    }

    async fn update_call_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
        expected: CallParticipantStatus,
        to: CallParticipantStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<CallParticipantEntity>, error::SystemError> {
        let mut state = self.state.lock().await;
        Ok(state.call_participant_mut(call_id, user_id).filter(|p| p.status == expected).map(
            |p| {
                p.status = to;
                match to {
                    CallParticipantStatus::Joined => p.joined_at = Some(now),
                    CallParticipantStatus::Ringing => {}
                    _ => p.left_at = Some(now),
                }
                p.clone()
            },
        ))
    }

    async fn finish_participants(
        &self,
        call_id: &Uuid,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, error::SystemError> {
        let mut state = self.state.lock().await;
        let mut finished = 0;
        for p in state.call_participants.iter_mut().filter(|p| p.call_id == *call_id) {
            p.status = match p.status {
                CallParticipantStatus::Ringing => CallParticipantStatus::Missed,
                CallParticipantStatus::Joined => CallParticipantStatus::Left,
                _ => continue,
            };
            p.left_at = Some(now);
            finished += 1;
        }
        Ok(finished)
    }

    async fn find_calls_for_user(
        &self,
        user_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CallEntity>, error::SystemError> {
        let state = self.state.lock().await;
        let in_chat = |chat_id: &Uuid| {
            state
                .chat_participants
                .iter()
                .any(|p| p.chat_id == *chat_id && p.user_id == *user_id && p.is_active())
        };
        let took_part = |call_id: &Uuid| {
            state.call_participants.iter().any(|p| p.call_id == *call_id && p.user_id == *user_id)
        };

        let mut calls: Vec<CallEntity> = state
            .calls
            .iter()
            .rev()
            .filter(|c| in_chat(&c.chat_id) || took_part(&c.id))
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            calls.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(calls)
    }
}

#[async_trait::async_trait]
impl SettingRepository for MemoryStore {
    async fn find_setting(&self, key: &str) -> Result<Option<SettingRow>, error::SystemError> {
        Ok(self.state.lock().await.settings.get(key).cloned())
    }

    async fn find_settings(&self) -> Result<Vec<SettingRow>, error::SystemError> {
        Ok(self.state.lock().await.settings.values().cloned().collect())
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value_type: SettingType,
        value: &serde_json::Value,
    ) -> Result<SettingRow, error::SystemError> {
        let row = SettingRow {
            key: key.to_string(),
            value: value.clone(),
            value_type,
            updated_at: now(),
        };
        self.state.lock().await.settings.insert(key.to_string(), row.clone());
        Ok(row)
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, error::SystemError> {
        Ok(self.state.lock().await.settings.remove(key).is_some())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Broadcast backend that keeps every published event.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<RecordedEvent>>,
    revoked: Mutex<Vec<(String, Uuid)>>,
}

impl RecordingBroadcaster {
    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().await.clone()
    }

    /// `(channel, user_id)` pairs whose subscriptions were revoked.
    pub async fn revoked(&self) -> Vec<(String, Uuid)> {
        self.revoked.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Broadcaster for RecordingBroadcaster {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), error::SystemError> {
        self.events.lock().await.push(RecordedEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn revoke(&self, channel: &str, user_id: Uuid) -> Result<(), error::SystemError> {
        self.revoked.lock().await.push((channel.to_string(), user_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySettingsCache {
    entries: Mutex<BTreeMap<String, Setting>>,
}

impl MemorySettingsCache {
    pub async fn cached(&self, key: &str) -> Option<Setting> {
        self.entries.lock().await.get(key).cloned()
    }
}

#[async_trait::async_trait]
impl SettingsCache for MemorySettingsCache {
    async fn get(&self, key: &str) -> Result<Option<Setting>, error::SystemError> {
        Ok(self.cached(key).await)
    }

    async fn put(&self, setting: &Setting) -> Result<(), error::SystemError> {
        self.entries.lock().await.insert(setting.key.clone(), setting.clone());
        Ok(())
    }

    async fn invalidate(&self, keys: &[String]) -> Result<(), error::SystemError> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::call::schema::CallType;

    #[tokio::test]
    async fn test_call_history_breaks_created_at_ties_by_id() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;

        let mut ids = Vec::new();
        for other in [bob, carol] {
            let (chat, _) = store.private_chat(alice, other).await;
            let call = store
                .create_call(
                    &NewCall {
                        chat_id: chat.id,
                        caller_id: alice,
                        receiver_id: Some(other),
                        call_type: CallType::Audio,
                    },
                    &[(alice, CallParticipantStatus::Joined), (other, CallParticipantStatus::Ringing)],
                )
                .await
                .unwrap();
            ids.push(call.id);
        }

        {
            let mut state = store.state.lock().await;
            let stamp = state.calls[0].created_at;
            for call in state.calls.iter_mut() {
                call.created_at = stamp;
            }
            state.calls.swap(0, 1);
        }

        let history = store.find_calls_for_user(&alice, None).await.unwrap();
        let order: Vec<Uuid> = history.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![ids[1], ids[0]]);
    }
}
