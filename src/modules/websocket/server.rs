/// WebSocket Server Actor
///
/// Owns every live session and the channel subscription table. Sessions
/// register on connect and are removed from all channels on disconnect;
/// [`Publish`] fans an event out to the sessions subscribed to a channel.
use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::events::*;
use super::message::ServerMessage;

#[derive(Default)]
pub struct WebSocketServer {
    /// session_id -> session recipient
    sessions: HashMap<Uuid, Recipient<ServerMessage>>,

    /// user_id -> session_ids (one per device)
    users: HashMap<Uuid, HashSet<Uuid>>,

    /// channel name -> subscribed session_ids
    channels: HashMap<String, HashSet<Uuid>>,
}

impl WebSocketServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_to_session(&self, session_id: &Uuid, message: ServerMessage) -> bool {
        match self.sessions.get(session_id) {
            Some(recipient) => {
                recipient.do_send(message);
                true
            }
            None => false,
        }
    }
}

impl Actor for WebSocketServer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket server stopped");
    }
}

impl Handler<Connect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        tracing::debug!("New WebSocket session connected: {}", msg.id);
        self.sessions.insert(msg.id, msg.addr);
    }
}

impl Handler<Disconnect> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        tracing::debug!("WebSocket session disconnected: {}", msg.id);

        self.sessions.remove(&msg.id);

        for subscribers in self.channels.values_mut() {
            subscribers.remove(&msg.id);
        }
        self.channels.retain(|_, subscribers| !subscribers.is_empty());

        let mut user_to_remove: Option<Uuid> = None;
        for (&user_id, sessions) in self.users.iter_mut() {
            if sessions.remove(&msg.id) {
                if sessions.is_empty() {
                    user_to_remove = Some(user_id);
                }
                break;
            }
        }

        if let Some(user_id) = user_to_remove {
            self.users.remove(&user_id);
            tracing::info!("User {} fully disconnected (no more sessions)", user_id);
        }
    }
}

impl Handler<Authenticate> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Authenticate, _: &mut Context<Self>) {
        let sessions = self.users.entry(msg.user_id).or_default();
        sessions.insert(msg.session_id);

        tracing::info!(
            "User {} authenticated on session {} ({} active session(s))",
            msg.user_id,
            msg.session_id,
            sessions.len()
        );
    }
}

impl Handler<Subscribe> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        if !self.sessions.contains_key(&msg.session_id) {
            return;
        }
        let name = msg.channel.name();
        let subscribers = self.channels.entry(name.clone()).or_default();
        subscribers.insert(msg.session_id);

        tracing::debug!(
            "Session {} subscribed to {} ({} subscriber(s))",
            msg.session_id,
            name,
            subscribers.len()
        );
    }
}

impl Handler<Unsubscribe> for WebSocketServer {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        let name = msg.channel.name();
        if let Some(subscribers) = self.channels.get_mut(&name) {
            subscribers.remove(&msg.session_id);
            if subscribers.is_empty() {
                self.channels.remove(&name);
            }
        }
    }
}

impl Handler<UnsubscribeUser> for WebSocketServer {
    type Result = usize;

    fn handle(&mut self, msg: UnsubscribeUser, _: &mut Context<Self>) -> usize {
        let (Some(sessions), Some(subscribers)) =
            (self.users.get(&msg.user_id), self.channels.get_mut(&msg.channel))
        else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|session_id| !sessions.contains(session_id));
        let removed = before - subscribers.len();
        if subscribers.is_empty() {
            self.channels.remove(&msg.channel);
        }

        tracing::debug!(
            "User {} unsubscribed from {} on {} session(s)",
            msg.user_id,
            msg.channel,
            removed
        );
        removed
    }
}

impl Handler<Publish> for WebSocketServer {
    type Result = usize;

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) -> usize {
        let Some(subscribers) = self.channels.get(&msg.channel) else {
            tracing::debug!("No subscribers on {}, {} dropped", msg.channel, msg.event);
            return 0;
        };

        let message = ServerMessage::Event {
            channel: msg.channel.clone(),
            event: msg.event.clone(),
            data: msg.data,
        };

        let sent = subscribers
            .iter()
            .filter(|session_id| self.send_to_session(session_id, message.clone()))
            .count();

        tracing::debug!("Published {} on {} to {} session(s)", msg.event, msg.channel, sent);
        sent
    }
}

impl Message for ServerMessage {
    type Result = ();
}
