use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::modules::setting::schema::SettingType;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSettingRequest {
    #[serde(rename = "type")]
    pub value_type: SettingType,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReloadResponse {
    pub driver: &'static str,
    pub enabled: bool,
}
