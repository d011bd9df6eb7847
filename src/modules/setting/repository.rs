use crate::{
    api::error,
    modules::setting::schema::{SettingRow, SettingType},
};

#[async_trait::async_trait]
pub trait SettingRepository {
    async fn find_setting(&self, key: &str) -> Result<Option<SettingRow>, error::SystemError>;

    async fn find_settings(&self) -> Result<Vec<SettingRow>, error::SystemError>;

    async fn upsert_setting(
        &self,
        key: &str,
        value_type: SettingType,
        value: &serde_json::Value,
    ) -> Result<SettingRow, error::SystemError>;

    async fn delete_setting(&self, key: &str) -> Result<bool, error::SystemError>;
}
