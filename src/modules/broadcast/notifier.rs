use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    api::error,
    modules::broadcast::{channel::Channel, pusher::PusherBroadcaster},
};

/// A pub/sub backend able to deliver one event to one channel.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), error::SystemError>;

    /// Drops the user's live subscriptions to `channel`. Backends that cannot
    /// reach client connections rely on channel auth alone.
    async fn revoke(&self, _channel: &str, _user_id: Uuid) -> Result<(), error::SystemError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastDriver {
    WebSocket,
    Reverb,
    Pusher,
    Log,
    Null,
}

impl BroadcastDriver {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Some(Self::WebSocket),
            "reverb" => Some(Self::Reverb),
            "pusher" => Some(Self::Pusher),
            "log" => Some(Self::Log),
            "null" | "none" => Some(Self::Null),
            _ => None,
        }
    }
}

/// Credentials for the Pusher-protocol HTTP API.
#[derive(Debug, Clone, PartialEq)]
pub struct PusherCredentials {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub scheme: String,
}

impl PusherCredentials {
    /// Reverb is addressed by host; Pusher Cloud by cluster.
    pub fn base_url(&self, driver: BroadcastDriver) -> Option<String> {
        match (driver, &self.host, &self.cluster) {
            (BroadcastDriver::Reverb, Some(host), _) => Some(match self.port {
                Some(port) => format!("{}://{}:{}", self.scheme, host, port),
                None => format!("{}://{}", self.scheme, host),
            }),
            (BroadcastDriver::Pusher, Some(host), _) => Some(format!("{}://{}", self.scheme, host)),
            (BroadcastDriver::Pusher, None, Some(cluster)) => {
                Some(format!("https://api-{cluster}.pusher.com"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    pub enabled: bool,
    pub driver: BroadcastDriver,
    pub pusher: Option<PusherCredentials>,
    pub timeout: Duration,
}

impl BroadcastConfig {
    pub fn new(driver: BroadcastDriver) -> Self {
        Self { enabled: true, driver, pusher: None, timeout: Duration::from_secs(2) }
    }

    /// Used when the configuration store cannot be read.
    pub fn fallback() -> Self {
        Self::new(BroadcastDriver::Log)
    }
}

pub struct LogBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for LogBroadcaster {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), error::SystemError> {
        tracing::info!("[broadcast] {} -> {}: {}", event, channel, payload);
        Ok(())
    }
}

pub struct NullBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for NullBroadcaster {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn publish(
        &self,
        _channel: &str,
        _event: &str,
        _payload: &serde_json::Value,
    ) -> Result<(), error::SystemError> {
        Ok(())
    }
}

struct NotifierState {
    enabled: bool,
    timeout: Duration,
    backend: Arc<dyn Broadcaster>,
}

/// Best-effort event fan-out used by every service.
///
/// Persistence has already committed by the time a service calls
/// [`Notifier::notify`], so every failure here ends in a log line.
pub struct Notifier {
    state: RwLock<NotifierState>,
    websocket: Option<Arc<dyn Broadcaster>>,
}

impl Notifier {
    pub fn new(config: &BroadcastConfig, websocket: Option<Arc<dyn Broadcaster>>) -> Self {
        let backend = Self::build_backend(config, websocket.as_ref());
        tracing::info!("Broadcast notifier using {} driver", backend.name());
        Self {
            state: RwLock::new(NotifierState {
                enabled: config.enabled,
                timeout: config.timeout,
                backend,
            }),
            websocket,
        }
    }

    pub fn with_backend(backend: Arc<dyn Broadcaster>) -> Self {
        Self {
            state: RwLock::new(NotifierState {
                enabled: true,
                timeout: Duration::from_secs(2),
                backend,
            }),
            websocket: None,
        }
    }

    fn build_backend(
        config: &BroadcastConfig,
        websocket: Option<&Arc<dyn Broadcaster>>,
    ) -> Arc<dyn Broadcaster> {
        match config.driver {
            BroadcastDriver::WebSocket => match websocket {
                Some(ws) => ws.clone(),
                None => {
                    tracing::warn!("WebSocket driver selected without a server, using log driver");
                    Arc::new(LogBroadcaster)
                }
            },
            BroadcastDriver::Reverb | BroadcastDriver::Pusher => {
                let backend = config.pusher.as_ref().and_then(|creds| {
                    let base_url = creds.base_url(config.driver)?;
                    PusherBroadcaster::new(base_url, creds.clone(), config.timeout).ok()
                });
                match backend {
                    Some(pusher) => Arc::new(pusher),
                    None => {
                        tracing::warn!(
                            "{:?} driver selected without usable credentials, using log driver",
                            config.driver
                        );
                        Arc::new(LogBroadcaster)
                    }
                }
            }
            BroadcastDriver::Log => Arc::new(LogBroadcaster),
            BroadcastDriver::Null => Arc::new(NullBroadcaster),
        }
    }

    /// Swap the backend for a freshly built one.
    pub async fn reload(&self, config: &BroadcastConfig) {
        let backend = Self::build_backend(config, self.websocket.as_ref());
        let mut state = self.state.write().await;
        tracing::info!(
            "Broadcast notifier reloaded: {} -> {} (enabled: {})",
            state.backend.name(),
            backend.name(),
            config.enabled
        );
        state.backend = backend;
        state.enabled = config.enabled;
        state.timeout = config.timeout;
    }

    pub async fn driver_name(&self) -> &'static str {
        self.state.read().await.backend.name()
    }

    /// Stops delivering `channel` to the user, on the active backend and on the
    /// WebSocket server even when another driver is active.
    pub async fn revoke(&self, channel: &Channel, user_id: Uuid) {
        let (timeout, backend) = {
            let state = self.state.read().await;
            (state.timeout, state.backend.clone())
        };

        let mut backends = vec![backend];
        if let Some(ws) = &self.websocket {
            if !Arc::ptr_eq(ws, &backends[0]) {
                backends.push(ws.clone());
            }
        }

        let name = channel.name();
        for backend in backends {
            match tokio::time::timeout(timeout, backend.revoke(&name, user_id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Revoking {} for {} on {} failed: {}",
                        name,
                        user_id,
                        backend.name(),
                        e
                    );
                }
                Err(_) => {
                    tracing::warn!("Revoking {} for {} timed out after {:?}", name, user_id, timeout);
                }
            }
        }
    }

    pub async fn notify<P>(&self, channel: &Channel, event: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        self.notify_many(std::slice::from_ref(channel), event, payload).await;
    }

    pub async fn notify_many<P>(&self, channels: &[Channel], event: &str, payload: &P)
    where
        P: Serialize + ?Sized,
    {
        if channels.is_empty() {
            return;
        }

        let (enabled, timeout, backend) = {
            let state = self.state.read().await;
            (state.enabled, state.timeout, state.backend.clone())
        };

        if !enabled {
            tracing::debug!("Broadcasting disabled, dropping {}", event);
            return;
        }

        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cannot serialize payload for {}: {}", event, e);
                return;
            }
        };

        for channel in channels {
            let name = channel.name();
            match tokio::time::timeout(timeout, backend.publish(&name, event, &payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Broadcast {} to {} failed: {}", event, name, e);
                }
                Err(_) => {
                    tracing::warn!("Broadcast {} to {} timed out after {:?}", event, name, timeout);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::RecordingBroadcaster;

    struct FailingBroadcaster;

    #[async_trait::async_trait]
    impl Broadcaster for FailingBroadcaster {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn publish(
            &self,
            _channel: &str,
            _event: &str,
            _payload: &serde_json::Value,
        ) -> Result<(), error::SystemError> {
            Err(error::SystemError::transport("connection refused"))
        }
    }

    #[test]
    fn test_driver_parse() {
        assert_eq!(BroadcastDriver::parse("Reverb"), Some(BroadcastDriver::Reverb));
        assert_eq!(BroadcastDriver::parse(" pusher "), Some(BroadcastDriver::Pusher));
        assert_eq!(BroadcastDriver::parse("ws"), Some(BroadcastDriver::WebSocket));
        assert_eq!(BroadcastDriver::parse("kafka"), None);
    }

    #[test]
    fn test_base_url_per_driver() {
        let creds = PusherCredentials {
            app_id: "1".into(),
            key: "key".into(),
            secret: "secret".into(),
            cluster: Some("eu".into()),
            host: None,
            port: None,
            scheme: "https".into(),
        };
        assert_eq!(
            creds.base_url(BroadcastDriver::Pusher).as_deref(),
            Some("https://api-eu.pusher.com")
        );
        assert_eq!(creds.base_url(BroadcastDriver::Reverb), None);

        let reverb = PusherCredentials {
            host: Some("localhost".into()),
            port: Some(8080),
            scheme: "http".into(),
            ..creds
        };
        assert_eq!(
            reverb.base_url(BroadcastDriver::Reverb).as_deref(),
            Some("http://localhost:8080")
        );
    }

    #[tokio::test]
    async fn test_notify_reaches_backend() {
        let recorder = Arc::new(RecordingBroadcaster::default());
        let notifier = Notifier::with_backend(recorder.clone());
        let user = Uuid::now_v7();

        notifier
            .notify(&Channel::Call(user), "call.ringing", &serde_json::json!({"id": 1}))
            .await;

        let events = recorder.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel, format!("call.{user}"));
        assert_eq!(events[0].event, "call.ringing");
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notifier = Notifier::with_backend(Arc::new(FailingBroadcaster));
        notifier.notify(&Channel::User(Uuid::now_v7()), "message.created", &1).await;
    }

    #[tokio::test]
    async fn test_reload_switches_backend_and_respects_disabled() {
        let recorder = Arc::new(RecordingBroadcaster::default());
        let websocket: Arc<dyn Broadcaster> = recorder.clone();
        let notifier =
            Notifier::new(&BroadcastConfig::new(BroadcastDriver::WebSocket), Some(websocket));
        assert_eq!(notifier.driver_name().await, "recording");

        let mut config = BroadcastConfig::new(BroadcastDriver::Null);
        notifier.reload(&config).await;
        assert_eq!(notifier.driver_name().await, "null");

        config.driver = BroadcastDriver::WebSocket;
        config.enabled = false;
        notifier.reload(&config).await;
        notifier.notify(&Channel::User(Uuid::now_v7()), "chat.read", &"x").await;
        assert!(recorder.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_revoke_reaches_websocket_under_any_driver() {
        let recorder = Arc::new(RecordingBroadcaster::default());
        let websocket: Arc<dyn Broadcaster> = recorder.clone();
        let notifier =
            Notifier::new(&BroadcastConfig::new(BroadcastDriver::WebSocket), Some(websocket));
        let (chat, user) = (Uuid::now_v7(), Uuid::now_v7());

        notifier.revoke(&Channel::Chat(chat), user).await;
        notifier.reload(&BroadcastConfig::new(BroadcastDriver::Null)).await;
        notifier.revoke(&Channel::Chat(chat), user).await;

        let expected = (format!("private-chat.{chat}"), user);
        assert_eq!(recorder.revoked().await, vec![expected.clone(), expected]);
    }

    #[tokio::test]
    async fn test_pusher_without_credentials_falls_back_to_log() {
        let notifier = Notifier::new(&BroadcastConfig::new(BroadcastDriver::Pusher), None);
        assert_eq!(notifier.driver_name().await, "log");
    }
}
