/// WebSocket Actor Events
///
/// Messages exchanged between the session actors, the server actor and the
/// broadcaster.
use actix::prelude::*;
use uuid::Uuid;

use super::message::ServerMessage;
use crate::modules::broadcast::channel::Channel;

/// A session opened a connection
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: Uuid,
    pub addr: Recipient<ServerMessage>,
}

/// A session closed its connection
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
}

/// A session verified its access token
#[derive(Message)]
#[rtype(result = "()")]
pub struct Authenticate {
    pub session_id: Uuid,
    pub user_id: Uuid,
}

/// Add a session to a channel. Authorisation happens in the session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub session_id: Uuid,
    pub channel: Channel,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub session_id: Uuid,
    pub channel: Channel,
}

/// Remove every session of a user from a channel, e.g. after they left a chat.
/// Replies with the number of sessions unsubscribed.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct UnsubscribeUser {
    pub user_id: Uuid,
    pub channel: String,
}

/// Deliver an event to every session subscribed to `channel`.
/// Replies with the number of sessions reached.
#[derive(Message, Clone)]
#[rtype(result = "usize")]
pub struct Publish {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

/// Transport-level activity (ping/pong frames) seen by the handler
#[derive(Message)]
#[rtype(result = "()")]
pub struct Heartbeat;

/// The socket loop ended; stop the session actor
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;
