/// Status Service
///
/// Ephemeral posts that disappear from every query once `expires_at` passes
/// and are physically removed by a periodic cleanup task. Each viewer is
/// recorded at most once per status.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        broadcast::{channel::Channel, event, notifier::Notifier},
        contact::{repository::ContactRepository, schema::ContactEntity},
        status::{
            model::{
                NewStatus, PostStatusRequest, StatusFeedEntry, StatusResponse, StatusViewer,
                StatusWithViews, ViewOutcome,
            },
            repository::StatusRepository,
            schema::{StatusEntity, StatusPrivacy},
        },
        user::repository::UserRepository,
    },
};

pub struct StatusService<S, C, U>
where
    S: StatusRepository + Send + Sync + 'static,
    C: ContactRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    status_repo: Arc<S>,
    contact_repo: Arc<C>,
    user_repo: Arc<U>,
    notifier: Arc<Notifier>,
    ttl: chrono::Duration,
}

impl<S, C, U> Clone for StatusService<S, C, U>
where
    S: StatusRepository + Send + Sync + 'static,
    C: ContactRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        StatusService {
            status_repo: self.status_repo.clone(),
            contact_repo: self.contact_repo.clone(),
            user_repo: self.user_repo.clone(),
            notifier: self.notifier.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S, C, U> StatusService<S, C, U>
where
    S: StatusRepository + Send + Sync + 'static,
    C: ContactRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(
        status_repo: Arc<S>,
        contact_repo: Arc<C>,
        user_repo: Arc<U>,
        notifier: Arc<Notifier>,
        ttl: chrono::Duration,
    ) -> Self {
        StatusService { status_repo, contact_repo, user_repo, notifier, ttl }
    }

    pub async fn post(
        &self,
        user_id: Uuid,
        request: PostStatusRequest,
    ) -> Result<StatusEntity, error::SystemError> {
        request.validate_payload()?;

        let status = self
            .status_repo
            .create_status(&NewStatus {
                user_id,
                content_type: request.content_type,
                content: request.content,
                media_ref: request.media_ref,
                caption: request.caption,
                background_color: request.background_color,
                text_color: request.text_color,
                font_style: request.font_style,
                privacy: request.privacy.unwrap_or(StatusPrivacy::Contacts),
                expires_at: chrono::Utc::now() + self.ttl,
            })
            .await?;

        log::info!("Status {} posted by {} ({:?})", status.id, user_id, status.privacy);

        let audience: Vec<Channel> = self
            .contact_repo
            .find_contacts(&user_id)
            .await?
            .iter()
            .filter(|entry| status.is_visible_to(&entry.contact_id, Some(entry)))
            .map(|entry| Channel::User(entry.contact_id))
            .collect();
        self.notifier.notify_many(&audience, event::STATUS_POSTED, &status).await;

        Ok(status)
    }

    /// Active status the viewer is allowed to see.
    async fn load_visible(
        &self,
        status_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<StatusEntity, error::SystemError> {
        let status = self
            .status_repo
            .find_status(status_id)
            .await?
            .filter(|s| !s.is_expired_at(chrono::Utc::now()))
            .ok_or_else(|| error::SystemError::not_found("Status not found"))?;

        let entry = self.contact_repo.find_contact(&status.user_id, viewer_id).await?;
        if !status.is_visible_to(viewer_id, entry.as_ref()) {
            return Err(error::SystemError::forbidden("You cannot view this status"));
        }
        Ok(status)
    }

    async fn load_owned(
        &self,
        status_id: &Uuid,
        author_id: &Uuid,
    ) -> Result<StatusEntity, error::SystemError> {
        let status = self
            .status_repo
            .find_status(status_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Status not found"))?;

        if status.user_id != *author_id {
            return Err(error::SystemError::forbidden("Only the author can do this"));
        }
        Ok(status)
    }

    pub async fn get_status(
        &self,
        status_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<StatusResponse, error::SystemError> {
        let status = self.load_visible(&status_id, &viewer_id).await?;
        let author = self
            .user_repo
            .find_by_id(&status.user_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Author not found"))?
            .into();

        let is_author = status.user_id == viewer_id;
        let view_count = if is_author {
            Some(self.status_repo.count_views(&status_id).await?)
        } else {
            None
        };
        let has_viewed = !is_author && self.status_repo.has_viewed(&status_id, &viewer_id).await?;

        Ok(StatusResponse { status, author, has_viewed, view_count })
    }

    /// Records the first view only; the author's own views are never recorded.
    pub async fn mark_viewed_by(
        &self,
        status_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<ViewOutcome, error::SystemError> {
        let status = self.load_visible(&status_id, &viewer_id).await?;

        if status.user_id == viewer_id
            || self.status_repo.has_viewed(&status_id, &viewer_id).await?
        {
            return Ok(ViewOutcome { status_id, recorded: false });
        }

        let recorded = self.status_repo.record_view(&status_id, &viewer_id).await?;
        if recorded {
            let payload = serde_json::json!({
                "status_id": status_id,
                "viewer_id": viewer_id,
                "viewed_at": chrono::Utc::now(),
            });
            self.notifier.notify(&Channel::User(status.user_id), event::STATUS_VIEWED, &payload).await;
        }

        Ok(ViewOutcome { status_id, recorded })
    }

    pub async fn get_viewers(
        &self,
        status_id: Uuid,
        requester_id: Uuid,
    ) -> Result<Vec<StatusViewer>, error::SystemError> {
        self.load_owned(&status_id, &requester_id).await?;

        let views = self.status_repo.find_views(&status_id).await?;
        let ids: Vec<Uuid> = views.iter().map(|v| v.viewer_id).collect();
        let users: HashMap<Uuid, _> = self
            .user_repo
            .find_summaries(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(views
            .into_iter()
            .filter_map(|v| {
                users
                    .get(&v.viewer_id)
                    .cloned()
                    .map(|viewer| StatusViewer { viewer, viewed_at: v.viewed_at })
            })
            .collect())
    }

    pub async fn get_view_count(&self, status_id: Uuid) -> Result<i64, error::SystemError> {
        self.status_repo.count_views(&status_id).await
    }

    /// Active statuses of the viewer's contacts, grouped by author.
    /// Unseen groups come first, then the most recently updated.
    pub async fn get_recent_from_contacts(
        &self,
        viewer_id: Uuid,
    ) -> Result<Vec<StatusFeedEntry>, error::SystemError> {
        let author_ids: Vec<Uuid> = self
            .contact_repo
            .find_contacts(&viewer_id)
            .await?
            .into_iter()
            .filter(|c| !c.is_blocked)
            .map(|c| c.contact_id)
            .collect();

        // what each author holds about the viewer decides visibility
        let entries: HashMap<Uuid, ContactEntity> = self
            .contact_repo
            .find_entries_about(&viewer_id, &author_ids)
            .await?
            .into_iter()
            .map(|e| (e.owner_id, e))
            .collect();

        let statuses: Vec<StatusEntity> = self
            .status_repo
            .find_active_by_authors(&author_ids, chrono::Utc::now())
            .await?
            .into_iter()
            .filter(|s| s.is_visible_to(&viewer_id, entries.get(&s.user_id)))
            .collect();

        let status_ids: Vec<Uuid> = statuses.iter().map(|s| s.id).collect();
        let viewed: HashSet<Uuid> =
            self.status_repo.find_viewed_ids(&viewer_id, &status_ids).await?.into_iter().collect();

        let mut grouped: HashMap<Uuid, Vec<StatusEntity>> = HashMap::new();
        for status in statuses {
            grouped.entry(status.user_id).or_default().push(status);
        }

        let authors: Vec<Uuid> = grouped.keys().copied().collect();
        let users: HashMap<Uuid, _> = self
            .user_repo
            .find_summaries(&authors)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut feed: Vec<StatusFeedEntry> = grouped
            .into_iter()
            .filter_map(|(author_id, statuses)| {
                let author = users.get(&author_id).cloned()?;
                let latest_at = statuses.iter().map(|s| s.created_at).max()?;
                let has_unviewed = statuses.iter().any(|s| !viewed.contains(&s.id));
                Some(StatusFeedEntry { author, statuses, has_unviewed, latest_at })
            })
            .collect();

        feed.sort_by(|a, b| {
            b.has_unviewed.cmp(&a.has_unviewed).then_with(|| b.latest_at.cmp(&a.latest_at))
        });

        Ok(feed)
    }

    pub async fn get_my_statuses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<StatusWithViews>, error::SystemError> {
        let statuses =
            self.status_repo.find_active_by_authors(&[user_id], chrono::Utc::now()).await?;

        let mut result = Vec::with_capacity(statuses.len());
        for status in statuses {
            let view_count = self.status_repo.count_views(&status.id).await?;
            result.push(StatusWithViews { status, view_count });
        }
        Ok(result)
    }

    pub async fn extend(
        &self,
        status_id: Uuid,
        author_id: Uuid,
        hours: i64,
    ) -> Result<StatusEntity, error::SystemError> {
        if hours <= 0 {
            return Err(error::SystemError::bad_request("Extension must be a positive number of hours"));
        }

        let status = self.load_owned(&status_id, &author_id).await?;
        if status.is_expired_at(chrono::Utc::now()) {
            return Err(error::SystemError::invalid_state("Status has already expired"));
        }

        let expires_at = status.expires_at + chrono::Duration::hours(hours);
        self.status_repo
            .update_expiry(&status_id, expires_at)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Status not found"))
    }

    pub async fn delete(&self, status_id: Uuid, author_id: Uuid) -> Result<(), error::SystemError> {
        self.load_owned(&status_id, &author_id).await?;
        self.status_repo.delete_status(&status_id).await?;
        log::info!("Status {} deleted by {}", status_id, author_id);
        Ok(())
    }

    pub async fn expire_old_statuses(&self) -> Result<u64, error::SystemError> {
        self.status_repo.delete_expired(chrono::Utc::now()).await
    }

    /// Runs [`Self::expire_old_statuses`] every `period` until the handle is aborted.
    pub fn spawn_cleanup(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let svc = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match svc.expire_old_statuses().await {
                    Ok(0) => log::debug!("Status cleanup: nothing expired"),
                    Ok(removed) => log::info!("Status cleanup removed {} expired statuses", removed),
                    Err(e) => log::error!("Status cleanup failed: {}", e),
                }
            }
        })
    }
}
