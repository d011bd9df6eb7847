/// WebSocket Module
///
/// Self-hosted broadcast transport. Clients connect on `GET /ws`,
/// authenticate with an access token and subscribe to broadcast channels;
/// the notifier publishes into the server actor through
/// [`broadcaster::WebSocketBroadcaster`].
///
/// - Message protocol (ClientMessage & ServerMessage)
/// - WebSocket Server actor (sessions, users, channel subscriptions)
/// - WebSocket Session actor (one per connection)
/// - HTTP handler (upgrade HTTP to WebSocket)
pub mod broadcaster;
pub mod events;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;
