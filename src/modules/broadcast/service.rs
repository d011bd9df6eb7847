use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::error,
    modules::broadcast::{
        channel::{Channel, ChannelAuthorizer},
        model::{ChannelAuthRequest, ChannelAuthResponse},
        notifier::PusherCredentials,
        pusher,
    },
};

/// Signs private channel subscriptions for Pusher-protocol clients.
#[derive(Clone)]
pub struct ChannelAuthService {
    authorizer: Arc<dyn ChannelAuthorizer>,
}

impl ChannelAuthService {
    pub fn new(authorizer: Arc<dyn ChannelAuthorizer>) -> Self {
        Self { authorizer }
    }

    pub fn authorizer(&self) -> Arc<dyn ChannelAuthorizer> {
        self.authorizer.clone()
    }

    pub async fn authorize(
        &self,
        user_id: Uuid,
        request: &ChannelAuthRequest,
        credentials: Option<&PusherCredentials>,
    ) -> Result<ChannelAuthResponse, error::SystemError> {
        if !is_socket_id(&request.socket_id) {
            return Err(error::SystemError::bad_request("Invalid socket id"));
        }

        let channel = Channel::parse(&request.channel_name)
            .ok_or_else(|| error::SystemError::bad_request("Unknown channel"))?;

        if !self.authorizer.can_subscribe(user_id, &channel).await? {
            tracing::debug!("User {} denied subscription to {}", user_id, channel);
            return Err(error::SystemError::forbidden("Cannot subscribe to this channel"));
        }

        let credentials = credentials.ok_or_else(|| {
            error::SystemError::bad_request("Broadcast driver does not sign channel subscriptions")
        })?;

        let auth = pusher::channel_auth(credentials, &request.socket_id, &request.channel_name)?;
        Ok(ChannelAuthResponse { auth })
    }
}

/// Pusher socket ids look like `1234.5678`.
fn is_socket_id(value: &str) -> bool {
    match value.split_once('.') {
        Some((a, b)) => {
            !a.is_empty()
                && !b.is_empty()
                && a.chars().all(|c| c.is_ascii_digit())
                && b.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
