/// Settings Service
///
/// Typed key/value configuration backed by the `settings` table. Reads go
/// through [`SettingsCache`]; every committed write runs the registered
/// [`SettingsListener`]s with the keys it touched.
use std::{sync::Arc, time::Duration};

use crate::{
    api::error,
    modules::{
        broadcast::notifier::{BroadcastConfig, BroadcastDriver, Notifier, PusherCredentials},
        setting::{
            cache::{CacheInvalidator, SettingsCache, SettingsListener},
            model::BroadcastReloadResponse,
            repository::SettingRepository,
            schema::{Setting, SettingValue},
        },
    },
};

pub const BROADCAST_ENABLED: &str = "broadcast.enabled";
pub const BROADCAST_DRIVER: &str = "broadcast.driver";
pub const BROADCAST_TIMEOUT_MS: &str = "broadcast.timeout_ms";
pub const PUSHER_APP_ID: &str = "broadcast.pusher.app_id";
pub const PUSHER_KEY: &str = "broadcast.pusher.key";
pub const PUSHER_SECRET: &str = "broadcast.pusher.secret";
pub const PUSHER_CLUSTER: &str = "broadcast.pusher.cluster";
pub const PUSHER_HOST: &str = "broadcast.pusher.host";
pub const PUSHER_PORT: &str = "broadcast.pusher.port";
pub const PUSHER_SCHEME: &str = "broadcast.pusher.scheme";

#[derive(Clone)]
pub struct SettingsService<S>
where
    S: SettingRepository + Send + Sync + 'static,
{
    setting_repo: Arc<S>,
    cache: Arc<dyn SettingsCache>,
    listeners: Vec<Arc<dyn SettingsListener>>,
    notifier: Arc<Notifier>,
    broadcast_defaults: BroadcastConfig,
}

impl<S> SettingsService<S>
where
    S: SettingRepository + Send + Sync + 'static,
{
    /// The cache is invalidated by a listener registered here.
    pub fn with_dependencies(
        setting_repo: Arc<S>,
        cache: Arc<dyn SettingsCache>,
        notifier: Arc<Notifier>,
        broadcast_defaults: BroadcastConfig,
    ) -> Self {
        let invalidator: Arc<dyn SettingsListener> = Arc::new(CacheInvalidator::new(cache.clone()));
        SettingsService {
            setting_repo,
            cache,
            listeners: vec![invalidator],
            notifier,
            broadcast_defaults,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SettingsListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingValue>, error::SystemError> {
        match self.cache.get(key).await {
            Ok(Some(setting)) => return Ok(Some(setting.value)),
            Ok(None) => {}
            Err(e) => log::warn!("Settings cache read for {} failed: {}", key, e),
        }

        let Some(row) = self.setting_repo.find_setting(key).await? else {
            return Ok(None);
        };
        let setting = Setting::try_from(row)?;

        if let Err(e) = self.cache.put(&setting).await {
            log::warn!("Settings cache write for {} failed: {}", key, e);
        }
        Ok(Some(setting.value))
    }

    /// Never fails: missing keys and read errors yield `default`.
    pub async fn get_or(&self, key: &str, default: SettingValue) -> SettingValue {
        match self.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                log::warn!("Setting {} unreadable, using default: {}", key, e);
                default
            }
        }
    }

    pub async fn set(&self, key: &str, value: SettingValue) -> Result<Setting, error::SystemError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(error::SystemError::bad_request("Setting key is required"));
        }

        let row =
            self.setting_repo.upsert_setting(key, value.value_type(), &value.to_json()).await?;
        let setting = Setting::try_from(row)?;
        log::info!("Setting {} updated ({:?})", key, setting.value.value_type());

        self.written(&[setting.key.clone()]).await;
        Ok(setting)
    }

    pub async fn delete(&self, key: &str) -> Result<(), error::SystemError> {
        if !self.setting_repo.delete_setting(key).await? {
            return Err(error::SystemError::not_found("Setting not found"));
        }
        log::info!("Setting {} deleted", key);
        self.written(&[key.to_string()]).await;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<Setting>, error::SystemError> {
        self.setting_repo.find_settings().await?.into_iter().map(Setting::try_from).collect()
    }

    async fn written(&self, keys: &[String]) {
        for listener in &self.listeners {
            listener.on_write(keys).await;
        }
    }

    /// Falls back to the log driver when the stored configuration cannot be read.
    pub async fn broadcast_config(&self) -> BroadcastConfig {
        match self.load_broadcast_config().await {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Broadcast settings unusable, falling back to log driver: {}", e);
                BroadcastConfig::fallback()
            }
        }
    }

    async fn load_broadcast_config(&self) -> Result<BroadcastConfig, error::SystemError> {
        let defaults = &self.broadcast_defaults;

        let enabled = match self.get(BROADCAST_ENABLED).await? {
            Some(value) => value.as_bool().ok_or_else(|| mistyped(BROADCAST_ENABLED))?,
            None => defaults.enabled,
        };
        let driver = match self.get(BROADCAST_DRIVER).await? {
            Some(value) => {
                let name = value.as_str().ok_or_else(|| mistyped(BROADCAST_DRIVER))?;
                BroadcastDriver::parse(name).ok_or_else(|| {
                    error::SystemError::bad_request(format!("Unknown broadcast driver {name}"))
                })?
            }
            None => defaults.driver,
        };
        let timeout = match self.get(BROADCAST_TIMEOUT_MS).await? {
            Some(value) => {
                let ms = value.as_i64().ok_or_else(|| mistyped(BROADCAST_TIMEOUT_MS))?;
                Duration::from_millis(ms.max(1) as u64)
            }
            None => defaults.timeout,
        };

        let pusher = match driver {
            BroadcastDriver::Reverb | BroadcastDriver::Pusher => self.pusher_credentials().await?,
            _ => None,
        };

        Ok(BroadcastConfig { enabled, driver, pusher, timeout })
    }

    async fn pusher_credentials(&self) -> Result<Option<PusherCredentials>, error::SystemError> {
        let (Some(app_id), Some(key), Some(secret)) = (
            self.get_string(PUSHER_APP_ID).await?,
            self.get_string(PUSHER_KEY).await?,
            self.get_string(PUSHER_SECRET).await?,
        ) else {
            return Ok(None);
        };

        let port = match self.get(PUSHER_PORT).await? {
            Some(value) => {
                let port = value.as_i64().ok_or_else(|| mistyped(PUSHER_PORT))?;
                Some(u16::try_from(port).map_err(|_| mistyped(PUSHER_PORT))?)
            }
            None => None,
        };

        Ok(Some(PusherCredentials {
            app_id,
            key,
            secret,
            cluster: self.get_string(PUSHER_CLUSTER).await?,
            host: self.get_string(PUSHER_HOST).await?,
            port,
            scheme: self.get_string(PUSHER_SCHEME).await?.unwrap_or_else(|| "https".to_string()),
        }))
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, error::SystemError> {
        match self.get(key).await? {
            Some(SettingValue::String(s)) if !s.is_empty() => Ok(Some(s)),
            Some(SettingValue::String(_)) | None => Ok(None),
            Some(_) => Err(mistyped(key)),
        }
    }

    /// Rebuilds the notifier backend from the current settings.
    pub async fn reload_broadcast(&self) -> BroadcastReloadResponse {
        let config = self.broadcast_config().await;
        self.notifier.reload(&config).await;
        BroadcastReloadResponse {
            driver: self.notifier.driver_name().await,
            enabled: config.enabled,
        }
    }
}

fn mistyped(key: &str) -> error::SystemError {
    error::SystemError::bad_request(format!("Setting {key} has the wrong type"))
}
