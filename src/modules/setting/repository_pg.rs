use crate::{
    api::error,
    modules::setting::{
        repository::SettingRepository,
        schema::{SettingRow, SettingType},
    },
};

#[derive(Clone)]
pub struct SettingRepositoryPg {
    pool: sqlx::PgPool,
}

impl SettingRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingRepository for SettingRepositoryPg {
    async fn find_setting(&self, key: &str) -> Result<Option<SettingRow>, error::SystemError> {
        let setting = sqlx::query_as::<_, SettingRow>("SELECT * FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(setting)
    }

    async fn find_settings(&self) -> Result<Vec<SettingRow>, error::SystemError> {
        let settings = sqlx::query_as::<_, SettingRow>("SELECT * FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(settings)
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value_type: SettingType,
        value: &serde_json::Value,
    ) -> Result<SettingRow, error::SystemError> {
        let setting = sqlx::query_as::<_, SettingRow>(
            r#"
            INSERT INTO settings (key, value, value_type, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                value_type = EXCLUDED.value_type,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(value_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, error::SystemError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
