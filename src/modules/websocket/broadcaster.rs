use actix::Addr;
use uuid::Uuid;

use super::{
    events::{Publish, UnsubscribeUser},
    server::WebSocketServer,
};
use crate::{api::error, modules::broadcast::notifier::Broadcaster};

/// Publishes through the in-process [`WebSocketServer`].
pub struct WebSocketBroadcaster {
    server: Addr<WebSocketServer>,
}

impl WebSocketBroadcaster {
    pub fn new(server: Addr<WebSocketServer>) -> Self {
        Self { server }
    }
}

#[async_trait::async_trait]
impl Broadcaster for WebSocketBroadcaster {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> Result<(), error::SystemError> {
        let delivered = self
            .server
            .send(Publish {
                channel: channel.to_string(),
                event: event.to_string(),
                data: payload.clone(),
            })
            .await
            .map_err(|e| error::SystemError::transport(format!("WebSocket server unavailable: {e}")))?;

        tracing::trace!("{} on {} reached {} session(s)", event, channel, delivered);
        Ok(())
    }

    async fn revoke(&self, channel: &str, user_id: Uuid) -> Result<(), error::SystemError> {
        self.server
            .send(UnsubscribeUser { user_id, channel: channel.to_string() })
            .await
            .map_err(|e| error::SystemError::transport(format!("WebSocket server unavailable: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{
        broadcast::{channel::Channel, notifier::Notifier},
        websocket::events::{Authenticate, Connect, Subscribe},
    };
    use actix::prelude::*;
    use std::sync::Arc;

    struct Sink;

    impl Actor for Sink {
        type Context = Context<Self>;
    }

    impl Handler<crate::modules::websocket::message::ServerMessage> for Sink {
        type Result = ();

        fn handle(
            &mut self,
            _: crate::modules::websocket::message::ServerMessage,
            _: &mut Context<Self>,
        ) {
        }
    }

    #[actix_web::test]
    async fn test_notifier_publishes_through_server() {
        let server = WebSocketServer::new().start();
        let session = Uuid::now_v7();
        let user = Uuid::now_v7();
        server.send(Connect { id: session, addr: Sink.start().recipient() }).await.unwrap();
        server.send(Subscribe { session_id: session, channel: Channel::User(user) }).await.unwrap();

        let backend = WebSocketBroadcaster::new(server.clone());
        backend
            .publish(&Channel::User(user).name(), "message.created", &serde_json::json!({}))
            .await
            .unwrap();

        let notifier = Notifier::with_backend(Arc::new(backend));
        assert_eq!(notifier.driver_name().await, "websocket");
        notifier.notify(&Channel::User(user), "message.created", &1).await;
    }

    #[actix_web::test]
    async fn test_revoke_unsubscribes_user_from_chat() {
        let server = WebSocketServer::new().start();
        let session = Uuid::now_v7();
        let user = Uuid::now_v7();
        let chat = Channel::Chat(Uuid::now_v7());
        server.send(Connect { id: session, addr: Sink.start().recipient() }).await.unwrap();
        server.send(Authenticate { session_id: session, user_id: user }).await.unwrap();
        server.send(Subscribe { session_id: session, channel: chat }).await.unwrap();

        let notifier =
            Notifier::with_backend(Arc::new(WebSocketBroadcaster::new(server.clone())));
        notifier.revoke(&chat, user).await;

        let delivered = server
            .send(Publish {
                channel: chat.name(),
                event: "message.deleted".into(),
                data: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert_eq!(delivered, 0);
    }
}
