/// Broadcast Transport
///
/// Pushes domain events (messages, calls, statuses) to subscribed clients.
/// Services only see [`notifier::Notifier`], which forwards to whichever
/// backend the configuration store selected:
///
/// - in-process WebSocket server (`websocket` module)
/// - Pusher-protocol HTTP API, for Pusher Cloud or a self-hosted Reverb
/// - log / null drivers
///
/// Publishing is best-effort: a failed publish is logged, never returned.
pub mod channel;
pub mod event;
pub mod handle;
pub mod model;
pub mod notifier;
pub mod pusher;
pub mod route;
pub mod service;
