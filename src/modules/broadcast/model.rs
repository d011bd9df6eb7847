use serde::{Deserialize, Serialize};
use validator::Validate;

/// Pusher `/broadcasting/auth` request, sent as JSON or form data.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChannelAuthRequest {
    #[validate(length(min = 3, max = 64))]
    pub socket_id: String,
    #[validate(length(min = 1, max = 200))]
    pub channel_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAuthResponse {
    pub auth: String,
}
