/// WebSocket Message Protocol
///
/// Frames exchanged between clients and the server over a WebSocket connection.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Authenticate the connection with an access token
    Auth { token: String },

    /// Subscribe to a broadcast channel, e.g. `private-chat.{id}`
    Subscribe { channel: String },

    Unsubscribe { channel: String },

    /// Keep-alive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Carries the channels the session was subscribed to automatically
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: Uuid, channels: Vec<String> },

    AuthFailed { reason: String },

    Subscribed { channel: String },

    SubscriptionFailed { channel: String, reason: String },

    Unsubscribed { channel: String },

    /// A broadcast event published on a subscribed channel
    Event { channel: String, event: String, data: serde_json::Value },

    Pong,

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_auth_deserialize() {
        let json = r#"{"type":"auth","token":"my-jwt-token"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { token } if token == "my-jwt-token"));
    }

    #[test]
    fn test_client_subscribe_deserialize() {
        let id = Uuid::now_v7();
        let json = format!(r#"{{"type":"subscribe","channel":"private-chat.{id}"}}"#);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(msg, ClientMessage::Subscribe { channel } if channel == format!("private-chat.{id}"))
        );
    }

    #[test]
    fn test_client_ping_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_invalid_type_returns_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"sendMessage"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"unsubscribe"}"#).is_err());
    }

    #[test]
    fn test_server_event_frame_shape() {
        let msg = ServerMessage::Event {
            channel: "call.abc".into(),
            event: "call.ringing".into(),
            data: serde_json::json!({"id": 1}),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["channel"], "call.abc");
        assert_eq!(json["event"], "call.ringing");
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn test_server_auth_success_serialize() {
        let uid = Uuid::now_v7();
        let msg = ServerMessage::AuthSuccess { user_id: uid, channels: vec![format!("call.{uid}")] };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"authSuccess\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains(&uid.to_string()));
    }

    #[test]
    fn test_server_pong_serialize() {
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_server_subscription_failed_serialize() {
        let msg = ServerMessage::SubscriptionFailed {
            channel: "private-chat.x".into(),
            reason: "Forbidden".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"subscriptionFailed\""));
    }
}
