/// WebSocket Session Actor
///
/// One actor per connection. Holds the authenticated user, forwards
/// subscriptions to the server once the [`ChannelAuthorizer`] allows them
/// and writes outbound frames to the mpsc channel bridged in `handler.rs`.
///
/// Async checks run through `ctx.spawn()` + `into_actor()`.
use actix::prelude::*;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::broadcast::channel::{Channel, ChannelAuthorizer};
use crate::utils::Claims;

use super::events::*;
use super::message::{ClientMessage, ServerMessage};
use super::server::WebSocketServer;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared by every session.
pub struct SessionConfig {
    pub authorizer: Arc<dyn ChannelAuthorizer>,
    pub jwt_secret: String,
}

pub struct WebSocketSession {
    pub id: Uuid,

    /// Set once the client authenticated
    pub user_id: Option<Uuid>,

    pub server: Addr<WebSocketServer>,

    /// JSON frames to the client (bridge -> handler.rs -> WebSocket)
    pub tx: mpsc::UnboundedSender<String>,

    config: Arc<SessionConfig>,
    last_seen: Instant,
}

fn send_json(tx: &mpsc::UnboundedSender<String>, session_id: Uuid, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if let Err(e) = tx.send(json) {
                tracing::debug!("Session {} closed, frame dropped: {}", session_id, e);
            }
        }
        Err(e) => {
            tracing::error!("Cannot serialize ServerMessage (session {}): {}", session_id, e);
        }
    }
}

impl WebSocketSession {
    pub fn new(
        server: Addr<WebSocketServer>,
        tx: mpsc::UnboundedSender<String>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self { id: Uuid::now_v7(), user_id: None, server, tx, config, last_seen: Instant::now() }
    }

    fn send_to_client(&self, msg: &ServerMessage) {
        send_json(&self.tx, self.id, msg);
    }

    fn send_error(&self, message: &str) {
        self.send_to_client(&ServerMessage::Error { message: message.to_string() });
    }

    fn require_auth(&self) -> Option<Uuid> {
        if self.user_id.is_none() {
            self.send_error("Authenticate before subscribing");
            tracing::warn!("Session {} is not authenticated, request rejected", self.id);
        }
        self.user_id
    }

    fn handle_client_message(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        self.last_seen = Instant::now();

        match msg {
            ClientMessage::Auth { token } => self.handle_auth(&token),
            ClientMessage::Subscribe { channel } => self.handle_subscribe(channel, ctx),
            ClientMessage::Unsubscribe { channel } => self.handle_unsubscribe(channel),
            ClientMessage::Ping => self.send_to_client(&ServerMessage::Pong),
        }
    }

    /// Verifies the token and subscribes the session to the user's own channels.
    fn handle_auth(&mut self, token: &str) {
        if self.user_id.is_some() {
            self.send_error("Session is already authenticated");
            return;
        }

        let claims = match Claims::decode(token, self.config.jwt_secret.as_bytes()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("JWT verification failed (session {}): {}", self.id, e);
                self.send_to_client(&ServerMessage::AuthFailed {
                    reason: "Token invalid or expired".to_string(),
                });
                return;
            }
        };

        if !claims.is_access_token() {
            self.send_to_client(&ServerMessage::AuthFailed {
                reason: "Access token required".to_string(),
            });
            return;
        }

        let user_id = claims.sub;
        self.user_id = Some(user_id);
        self.server.do_send(Authenticate { session_id: self.id, user_id });

        let own = [Channel::User(user_id), Channel::Call(user_id)];
        for channel in own {
            self.server.do_send(Subscribe { session_id: self.id, channel });
        }

        self.send_to_client(&ServerMessage::AuthSuccess {
            user_id,
            channels: own.iter().map(Channel::name).collect(),
        });
        tracing::info!("User {} authenticated on session {}", user_id, self.id);
    }

    fn handle_subscribe(&self, name: String, ctx: &mut Context<Self>) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        let Some(channel) = Channel::parse(&name) else {
            self.send_to_client(&ServerMessage::SubscriptionFailed {
                channel: name,
                reason: "Unknown channel".to_string(),
            });
            return;
        };

        let authorizer = self.config.authorizer.clone();
        let server = self.server.clone();
        let tx = self.tx.clone();
        let session_id = self.id;

        ctx.spawn(
            async move {
                let reply = match authorizer.can_subscribe(user_id, &channel).await {
                    Ok(true) => {
                        server.do_send(Subscribe { session_id, channel });
                        ServerMessage::Subscribed { channel: name }
                    }
                    Ok(false) => {
                        tracing::debug!("User {} denied subscription to {}", user_id, name);
                        ServerMessage::SubscriptionFailed {
                            channel: name,
                            reason: "Forbidden".to_string(),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Subscription check for {} failed: {}", name, e);
                        ServerMessage::SubscriptionFailed {
                            channel: name,
                            reason: "Subscription check failed".to_string(),
                        }
                    }
                };
                send_json(&tx, session_id, &reply);
            }
            .into_actor(self),
        );
    }

    fn handle_unsubscribe(&self, name: String) {
        if self.require_auth().is_none() {
            return;
        }
        match Channel::parse(&name) {
            Some(channel) => {
                self.server.do_send(Unsubscribe { session_id: self.id, channel });
                self.send_to_client(&ServerMessage::Unsubscribed { channel: name });
            }
            None => self.send_error("Unknown channel"),
        }
    }

    fn heartbeat(&self, ctx: &mut Context<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_seen) > CLIENT_TIMEOUT {
                tracing::info!("Session {} timed out, closing", act.id);
                ctx.stop();
            }
        });
    }
}

impl Actor for WebSocketSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session started: {}", self.id);
        self.heartbeat(ctx);
        self.server.do_send(Connect { id: self.id, addr: ctx.address().recipient() });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket session stopped: {}", self.id);
        self.server.do_send(Disconnect { id: self.id });
    }
}

impl Message for ClientMessage {
    type Result = ();
}

impl Handler<ClientMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ClientMessage, ctx: &mut Context<Self>) {
        self.handle_client_message(msg, ctx);
    }
}

impl Handler<ServerMessage> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: ServerMessage, _ctx: &mut Context<Self>) {
        self.send_to_client(&msg);
    }
}

impl Handler<Heartbeat> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, _: Heartbeat, _ctx: &mut Context<Self>) {
        self.last_seen = Instant::now();
    }
}

impl Handler<Shutdown> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Context<Self>) {
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modules::{broadcast::channel::ParticipantChannelAuthorizer, user::schema::UserRole},
        test::MemoryStore,
        utils::TypeClaims,
    };

    const SECRET: &str = "ws-test-secret";

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no frame within a second")
            .expect("channel closed");
        serde_json::from_str(&frame).unwrap()
    }

    fn token(user: Uuid, kind: TypeClaims) -> String {
        Claims::new(&user, &UserRole::User, 60).with_type(kind).encode(SECRET.as_bytes()).unwrap()
    }

    async fn session(
        store: &MemoryStore,
    ) -> (Addr<WebSocketSession>, Addr<WebSocketServer>, mpsc::UnboundedReceiver<String>) {
        let server = WebSocketServer::new().start();
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Arc::new(SessionConfig {
            authorizer: Arc::new(ParticipantChannelAuthorizer::new(Arc::new(store.clone()))),
            jwt_secret: SECRET.to_string(),
        });
        let addr = WebSocketSession::new(server.clone(), tx, config).start();
        (addr, server, rx)
    }

    #[actix_web::test]
    async fn test_auth_subscribes_own_channels() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let (addr, server, mut rx) = session(&store).await;

        addr.do_send(ClientMessage::Auth { token: token(alice, TypeClaims::AccessToken) });
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "authSuccess");
        assert_eq!(frame["channels"][1], format!("call.{alice}"));

        let delivered = server
            .send(Publish {
                channel: Channel::Call(alice).name(),
                event: "call.ringing".into(),
                data: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert_eq!(delivered, 1);

        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["event"], "call.ringing");
    }

    #[actix_web::test]
    async fn test_refresh_token_is_rejected() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let (addr, _, mut rx) = session(&store).await;

        addr.do_send(ClientMessage::Auth { token: token(alice, TypeClaims::RefreshToken) });
        assert_eq!(next_frame(&mut rx).await["type"], "authFailed");

        addr.do_send(ClientMessage::Subscribe { channel: Channel::User(alice).name() });
        assert_eq!(next_frame(&mut rx).await["type"], "error");
    }

    #[actix_web::test]
    async fn test_subscribe_checks_chat_membership() {
        let store = MemoryStore::new();
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;
        let (chat, _) = store.private_chat(alice, bob).await;
        let (other_chat, _) = store.private_chat(bob, carol).await;
        let (addr, _, mut rx) = session(&store).await;

        addr.do_send(ClientMessage::Auth { token: token(alice, TypeClaims::AccessToken) });
        next_frame(&mut rx).await;

        addr.do_send(ClientMessage::Subscribe { channel: Channel::Chat(chat.id).name() });
        assert_eq!(next_frame(&mut rx).await["type"], "subscribed");

        addr.do_send(ClientMessage::Subscribe { channel: Channel::Chat(other_chat.id).name() });
        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "subscriptionFailed");
        assert_eq!(frame["reason"], "Forbidden");

        addr.do_send(ClientMessage::Subscribe { channel: "presence-lobby".into() });
        assert_eq!(next_frame(&mut rx).await["reason"], "Unknown channel");

        addr.do_send(ClientMessage::Ping);
        assert_eq!(next_frame(&mut rx).await["type"], "pong");
    }
}
