use std::sync::Arc;

use crate::{api::error, configs::RedisCache, modules::setting::schema::Setting};

const KEY_PREFIX: &str = "setting:";
const TTL_SECS: usize = 3600;

/// Read-through cache in front of the settings table.
#[async_trait::async_trait]
pub trait SettingsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Setting>, error::SystemError>;

    async fn put(&self, setting: &Setting) -> Result<(), error::SystemError>;

    async fn invalidate(&self, keys: &[String]) -> Result<(), error::SystemError>;
}

#[async_trait::async_trait]
impl SettingsCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Setting>, error::SystemError> {
        RedisCache::get::<Setting>(self, &format!("{KEY_PREFIX}{key}")).await
    }

    async fn put(&self, setting: &Setting) -> Result<(), error::SystemError> {
        self.set(&format!("{KEY_PREFIX}{}", setting.key), setting, TTL_SECS).await
    }

    async fn invalidate(&self, keys: &[String]) -> Result<(), error::SystemError> {
        for key in keys {
            self.delete(&format!("{KEY_PREFIX}{key}")).await?;
        }
        Ok(())
    }
}

/// Callback run after a settings write has committed.
#[async_trait::async_trait]
pub trait SettingsListener: Send + Sync {
    async fn on_write(&self, keys: &[String]);
}

pub struct CacheInvalidator {
    cache: Arc<dyn SettingsCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn SettingsCache>) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl SettingsListener for CacheInvalidator {
    async fn on_write(&self, keys: &[String]) {
        if let Err(e) = self.cache.invalidate(keys).await {
            log::warn!("Cannot invalidate cached settings {:?}: {}", keys, e);
        }
    }
}
