/// Call Service
///
/// Signaling only: the aggregate status moves through the one-way machine in
/// [`CallEntity::plan`], every write is a compare-and-swap on the expected
/// status, and a ringing call is marked missed by a per-call timer unless
/// someone settles it first.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::Mutex, task::AbortHandle};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        broadcast::{channel::Channel, event, notifier::Notifier},
        call::{
            model::{
                CallDetail, CallDirection, CallLogEntry, CallStatistics, InitiateCallRequest,
                NewCall, DEFAULT_LOG_LIMIT,
            },
            repository::CallRepository,
            schema::{
                CallAction, CallEntity, CallParticipantEntity, CallParticipantStatus, CallStatus,
            },
        },
        chat::{
            repository::ChatRepository,
            schema::{ChatEntity, ChatKind},
        },
        user::repository::UserRepository,
    },
};

pub struct CallService<R, C, U>
where
    R: CallRepository + Send + Sync + 'static,
    C: ChatRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    call_repo: Arc<R>,
    chat_repo: Arc<C>,
    user_repo: Arc<U>,
    notifier: Arc<Notifier>,
    ring_timeout: Duration,
    timers: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl<R, C, U> Clone for CallService<R, C, U>
where
    R: CallRepository + Send + Sync + 'static,
    C: ChatRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        CallService {
            call_repo: self.call_repo.clone(),
            chat_repo: self.chat_repo.clone(),
            user_repo: self.user_repo.clone(),
            notifier: self.notifier.clone(),
            ring_timeout: self.ring_timeout,
            timers: self.timers.clone(),
        }
    }
}

impl<R, C, U> CallService<R, C, U>
where
    R: CallRepository + Send + Sync + 'static,
    C: ChatRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        call_repo: Arc<R>,
        chat_repo: Arc<C>,
        user_repo: Arc<U>,
        notifier: Arc<Notifier>,
        ring_timeout: Duration,
    ) -> Self {
        CallService {
            call_repo,
            chat_repo,
            user_repo,
            notifier,
            ring_timeout,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn initiate(
        &self,
        caller_id: Uuid,
        request: InitiateCallRequest,
    ) -> Result<CallDetail, error::SystemError> {
        if request.receiver_id == Some(caller_id) {
            return Err(error::SystemError::bad_request("Cannot call yourself"));
        }
        if let Some(receiver_id) = request.receiver_id {
            if !self.user_repo.exists(&receiver_id).await? {
                return Err(error::SystemError::bad_request("Receiver does not exist"));
            }
        }

        let (chat, receiver_id, receivers) = match request.chat_id {
            Some(chat_id) => self.resolve_receivers(chat_id, caller_id, request.receiver_id).await?,
            None => {
                let receiver_id = request.receiver_id.ok_or_else(|| {
                    error::SystemError::bad_request("Either chat_id or receiver_id is required")
                })?;
                let chat = self.private_chat(caller_id, receiver_id).await?;
                (chat, Some(receiver_id), vec![receiver_id])
            }
        };

        if receivers.is_empty() {
            return Err(error::SystemError::bad_request("There is nobody to call in this chat"));
        }
        if self.call_repo.find_active_for_chat(&chat.id).await?.is_some() {
            return Err(error::SystemError::conflict("Chat already has an active call"));
        }

        let mut participants = vec![(caller_id, CallParticipantStatus::Joined)];
        participants.extend(receivers.iter().map(|id| (*id, CallParticipantStatus::Ringing)));

        let call = self
            .call_repo
            .create_call(
                &NewCall { chat_id: chat.id, caller_id, receiver_id, call_type: request.call_type },
                &participants,
            )
            .await?;
        log::info!(
            "Call {} started by {} in chat {} ringing {} receiver(s)",
            call.id,
            caller_id,
            chat.id,
            receivers.len()
        );

        self.schedule_timeout(call.id).await;

        let detail = self.detail(call).await?;
        let channels: Vec<Channel> = receivers.iter().copied().map(Channel::Call).collect();
        self.notifier.notify_many(&channels, event::CALL_RINGING, &detail).await;

        Ok(detail)
    }

    /// Private chats ring the other member; group chats ring every other active member.
    async fn resolve_receivers(
        &self,
        chat_id: Uuid,
        caller_id: Uuid,
        receiver_id: Option<Uuid>,
    ) -> Result<(ChatEntity, Option<Uuid>, Vec<Uuid>), error::SystemError> {
        let (chat, _) = self.chat_repo.require_membership(&chat_id, &caller_id).await?;
        let others: Vec<Uuid> = self
            .chat_repo
            .find_participants(&chat_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active() && p.user_id != caller_id)
            .map(|p| p.user_id)
            .collect();

        if let Some(receiver_id) = receiver_id {
            if !others.contains(&receiver_id) {
                return Err(error::SystemError::bad_request("Receiver is not in this chat"));
            }
        }

        match chat.kind {
            ChatKind::Private => {
                let other = others.first().copied();
                Ok((chat, other, others))
            }
            ChatKind::Group => Ok((chat, None, others)),
        }
    }

    async fn private_chat(
        &self,
        caller_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<ChatEntity, error::SystemError> {
        let (chat, created) =
            self.chat_repo.find_or_create_private(&caller_id, &receiver_id).await?;
        if created {
            log::info!("Private chat {} created for a call from {}", chat.id, caller_id);
            self.notifier
                .notify_many(
                    &[Channel::User(caller_id), Channel::User(receiver_id)],
                    event::CHAT_CREATED,
                    &chat,
                )
                .await;
        }
        Ok(chat)
    }

    /// First answer moves the call to `Answered`; on a group call that is
    /// already answered, later answers only join the participant.
    pub async fn answer(
        &self,
        call_id: Uuid,
        user_id: Uuid,
    ) -> Result<CallEntity, error::SystemError> {
        let mut call = self.require_call(&call_id).await?;
        let participant = self.require_participant(&call_id, &user_id).await?;
        if participant.status != CallParticipantStatus::Ringing {
            return Err(error::SystemError::invalid_state("Call is not ringing for this user"));
        }

        let now = chrono::Utc::now();
        let mut won = false;

        if call.status == CallStatus::Ringing {
            let transition = call.plan(CallAction::Answer, now)?;
            match self.call_repo.apply_transition(&call_id, &transition).await? {
                Some(updated) => {
                    call = updated;
                    won = true;
                }
                None => call = self.require_call(&call_id).await?,
            }
        }

        if !won && !(call.is_group() && call.status == CallStatus::Answered) {
            return Err(error::SystemError::invalid_state(format!(
                "Cannot answer a call that is {:?}",
                call.status
            )));
        }

        self.call_repo
            .update_call_participant(
                &call_id,
                &user_id,
                CallParticipantStatus::Ringing,
                CallParticipantStatus::Joined,
                now,
            )
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("Call is not ringing for this user"))?;

        let payload = serde_json::json!({ "call": call, "user_id": user_id });
        if won {
            self.cancel_timeout(&call_id).await;
            log::info!("Call {} answered by {}", call_id, user_id);
            self.notify_participants(&call_id, event::CALL_ANSWERED, &payload).await;
        } else {
            log::info!("User {} joined call {}", user_id, call_id);
            self.notify_participants(&call_id, event::CALL_PARTICIPANT_JOINED, &payload).await;
        }

        Ok(call)
    }

    /// A 1:1 decline settles the call; in a group the call is declined once no
    /// receiver is still ringing or joined.
    pub async fn decline(
        &self,
        call_id: Uuid,
        user_id: Uuid,
    ) -> Result<CallEntity, error::SystemError> {
        let mut call = self.require_call(&call_id).await?;
        let participant = self.require_participant(&call_id, &user_id).await?;
        if user_id == call.caller_id {
            return Err(error::SystemError::bad_request("The caller ends a call, not declines it"));
        }
        if participant.status != CallParticipantStatus::Ringing {
            return Err(error::SystemError::invalid_state("Call is not ringing for this user"));
        }

        let now = chrono::Utc::now();
        let mut settled = false;

        if !call.is_group() {
            let transition = call.plan(CallAction::Decline, now)?;
            call = self
                .call_repo
                .apply_transition(&call_id, &transition)
                .await?
                .ok_or_else(|| error::SystemError::invalid_state("Call is no longer ringing"))?;
            settled = true;
        }

        self.call_repo
            .update_call_participant(
                &call_id,
                &user_id,
                CallParticipantStatus::Ringing,
                CallParticipantStatus::Declined,
                now,
            )
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("Call is not ringing for this user"))?;

        if call.is_group() && call.status == CallStatus::Ringing {
            let participants = self.call_repo.find_call_participants(&call_id).await?;
            let pending = participants.iter().any(|p| {
                p.user_id != call.caller_id
                    && matches!(
                        p.status,
                        CallParticipantStatus::Ringing | CallParticipantStatus::Joined
                    )
            });
            if !pending {
                let transition = call.plan(CallAction::Decline, now)?;
                if let Some(updated) = self.call_repo.apply_transition(&call_id, &transition).await?
                {
                    call = updated;
                    settled = true;
                }
            }
        }

        if settled {
            self.cancel_timeout(&call_id).await;
            self.call_repo.finish_participants(&call_id, now).await?;
            log::info!("Call {} declined by {}", call_id, user_id);
        }

        let payload = serde_json::json!({ "call": call, "user_id": user_id });
        self.notify_participants(&call_id, event::CALL_DECLINED, &payload).await;

        Ok(call)
    }

    pub async fn end(&self, call_id: Uuid, user_id: Uuid) -> Result<CallEntity, error::SystemError> {
        let call = self.require_call(&call_id).await?;
        self.require_participant(&call_id, &user_id).await?;
        self.close(call, user_id).await
    }

    async fn close(
        &self,
        call: CallEntity,
        user_id: Uuid,
    ) -> Result<CallEntity, error::SystemError> {
        let now = chrono::Utc::now();
        let transition = call.plan(CallAction::End, now)?;
        let ended = self
            .call_repo
            .apply_transition(&call.id, &transition)
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("Call state changed, try again"))?;

        self.cancel_timeout(&call.id).await;
        self.call_repo.finish_participants(&call.id, now).await?;
        log::info!("Call {} ended by {} after {:?}s", call.id, user_id, ended.duration);

        let payload = serde_json::json!({
            "call": ended,
            "duration": ended.duration,
            "ended_by": user_id,
        });
        self.notify_participants(&call.id, event::CALL_ENDED, &payload).await;

        Ok(ended)
    }

    /// Ends the call once fewer than two participants remain joined.
    pub async fn leave(
        &self,
        call_id: Uuid,
        user_id: Uuid,
    ) -> Result<CallEntity, error::SystemError> {
        let call = self.require_call(&call_id).await?;
        self.require_participant(&call_id, &user_id).await?;
        if call.status.is_terminal() {
            return Err(error::SystemError::invalid_state("Call has already finished"));
        }

        self.call_repo
            .update_call_participant(
                &call_id,
                &user_id,
                CallParticipantStatus::Joined,
                CallParticipantStatus::Left,
                chrono::Utc::now(),
            )
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("User has not joined this call"))?;

        let payload = serde_json::json!({ "call_id": call_id, "user_id": user_id });
        self.notify_participants(&call_id, event::CALL_PARTICIPANT_LEFT, &payload).await;

        let joined = self
            .call_repo
            .find_call_participants(&call_id)
            .await?
            .iter()
            .filter(|p| p.status == CallParticipantStatus::Joined)
            .count();

        let should_end = match call.status {
            CallStatus::Answered => joined < 2,
            CallStatus::Ringing => joined == 0,
            _ => false,
        };
        if !should_end {
            return Ok(call);
        }

        match self.close(call, user_id).await {
            Ok(ended) => Ok(ended),
            Err(error::SystemError::InvalidState(_)) => {
                log::debug!("Call {} was settled concurrently while {} left", call_id, user_id);
                self.require_call(&call_id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Marks a still ringing call as missed and cancels its timer.
    pub async fn mark_as_missed(&self, call_id: Uuid) -> Result<CallEntity, error::SystemError> {
        self.cancel_timeout(&call_id).await;
        self.miss(call_id).await
    }

    async fn miss(&self, call_id: Uuid) -> Result<CallEntity, error::SystemError> {
        let call = self.require_call(&call_id).await?;
        let now = chrono::Utc::now();
        let transition = call.plan(CallAction::Miss, now)?;
        let missed = self
            .call_repo
            .apply_transition(&call_id, &transition)
            .await?
            .ok_or_else(|| error::SystemError::invalid_state("Call is no longer ringing"))?;

        self.call_repo.finish_participants(&call_id, now).await?;
        log::info!("Call {} missed", call_id);

        let payload = serde_json::json!({ "call": missed });
        self.notify_participants(&call_id, event::CALL_MISSED, &payload).await;

        Ok(missed)
    }

    async fn schedule_timeout(&self, call_id: Uuid) {
        let svc = self.clone();
        let timeout = self.ring_timeout;

        // held across spawn so the task cannot remove its entry before insertion
        let mut timers = self.timers.lock().await;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            svc.timers.lock().await.remove(&call_id);
            match svc.miss(call_id).await {
                Ok(_) => log::debug!("Ring timeout fired for call {}", call_id),
                Err(error::SystemError::InvalidState(_)) => {
                    log::debug!("Ring timeout for call {} ignored, already settled", call_id)
                }
                Err(e) => log::error!("Ring timeout for call {} failed: {}", call_id, e),
            }
        });
        timers.insert(call_id, task.abort_handle());
    }

    async fn cancel_timeout(&self, call_id: &Uuid) {
        if let Some(handle) = self.timers.lock().await.remove(call_id) {
            handle.abort();
        }
    }

    /// Marks every call that has rung longer than the ring timeout as missed,
    /// including calls whose timer did not survive a restart.
    pub async fn expire_stale_rings(&self) -> Result<u64, error::SystemError> {
        let ring_timeout = chrono::Duration::from_std(self.ring_timeout)
            .map_err(|e| error::SystemError::InternalError(Box::new(e)))?;
        let stale = self.call_repo.find_stale_ringing(chrono::Utc::now() - ring_timeout).await?;

        let mut missed = 0;
        for call in stale {
            self.cancel_timeout(&call.id).await;
            match self.miss(call.id).await {
                Ok(_) => missed += 1,
                Err(error::SystemError::InvalidState(_)) => {
                    log::debug!("Stale call {} was settled before the sweep", call.id)
                }
                Err(e) => log::error!("Cannot mark stale call {} as missed: {}", call.id, e),
            }
        }
        Ok(missed)
    }

    /// Runs [`Self::expire_stale_rings`] now and then every `period` until the handle is aborted.
    pub fn spawn_ring_sweep(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let svc = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match svc.expire_stale_rings().await {
                    Ok(0) => log::debug!("Ring sweep: no stale calls"),
                    Ok(missed) => log::info!("Ring sweep marked {} stale calls as missed", missed),
                    Err(e) => log::error!("Ring sweep failed: {}", e),
                }
            }
        })
    }

    pub async fn get_call(
        &self,
        call_id: Uuid,
        user_id: Uuid,
    ) -> Result<CallDetail, error::SystemError> {
        let call = self.require_call(&call_id).await?;
        let in_call = self.call_repo.find_call_participant(&call_id, &user_id).await?.is_some();
        let in_chat = self.chat_repo.find_participant(&call.chat_id, &user_id).await?.is_some();
        if !in_call && !in_chat {
            return Err(error::SystemError::forbidden("You are not part of this call"));
        }
        self.detail(call).await
    }

    pub async fn get_logs_for_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CallLogEntry>, error::SystemError> {
        let calls = self
            .call_repo
            .find_calls_for_user(&user_id, Some(limit.unwrap_or(DEFAULT_LOG_LIMIT)))
            .await?;

        let chat_ids: HashSet<Uuid> = calls.iter().map(|c| c.chat_id).collect();
        let mut members: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for chat_id in chat_ids {
            let participants = self.chat_repo.find_participants(&chat_id).await?;
            members.insert(chat_id, participants.into_iter().map(|p| p.user_id).collect());
        }

        let mut user_ids: Vec<Uuid> = calls
            .iter()
            .map(|c| c.caller_id)
            .chain(members.values().flatten().copied())
            .collect();
        user_ids.sort();
        user_ids.dedup();
        let users: HashMap<Uuid, _> = self
            .user_repo
            .find_summaries(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(calls
            .into_iter()
            .map(|call| {
                let direction = if call.caller_id == user_id {
                    CallDirection::Outgoing
                } else {
                    CallDirection::Incoming
                };
                let chat_participants = members
                    .get(&call.chat_id)
                    .map(|ids| ids.iter().filter_map(|id| users.get(id).cloned()).collect())
                    .unwrap_or_default();
                CallLogEntry {
                    caller: users.get(&call.caller_id).cloned(),
                    direction,
                    chat_participants,
                    call,
                }
            })
            .collect())
    }

    pub async fn get_statistics(&self, user_id: Uuid) -> Result<CallStatistics, error::SystemError> {
        let calls = self.call_repo.find_calls_for_user(&user_id, None).await?;
        Ok(CallStatistics::from_calls(&user_id, &calls))
    }

    async fn require_call(&self, call_id: &Uuid) -> Result<CallEntity, error::SystemError> {
        self.call_repo
            .find_call(call_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Call not found"))
    }

    async fn require_participant(
        &self,
        call_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<CallParticipantEntity, error::SystemError> {
        self.call_repo
            .find_call_participant(call_id, user_id)
            .await?
            .ok_or_else(|| error::SystemError::forbidden("You are not part of this call"))
    }

    async fn detail(&self, call: CallEntity) -> Result<CallDetail, error::SystemError> {
        let participants = self.call_repo.find_call_participants(&call.id).await?;
        let caller = self.user_repo.find_summaries(&[call.caller_id]).await?.into_iter().next();
        Ok(CallDetail { call, caller, participants })
    }

    async fn notify_participants(
        &self,
        call_id: &Uuid,
        event: &str,
        payload: &serde_json::Value,
    ) {
        let participants = match self.call_repo.find_call_participants(call_id).await {
            Ok(participants) => participants,
            Err(e) => {
                log::warn!("Cannot load participants of call {} for {}: {}", call_id, event, e);
                return;
            }
        };
        let channels: Vec<Channel> =
            participants.iter().map(|p| Channel::Call(p.user_id)).collect();
        self.notifier.notify_many(&channels, event, payload).await;
    }
}
