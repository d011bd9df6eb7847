//! Event names pushed over the broadcast transport.

pub const MESSAGE_CREATED: &str = "message.created";
pub const MESSAGE_UPDATED: &str = "message.updated";
pub const MESSAGE_DELETED: &str = "message.deleted";
pub const MESSAGE_STATUS: &str = "message.status";
pub const MESSAGE_REACTION: &str = "message.reaction";

pub const CHAT_CREATED: &str = "chat.created";
pub const CHAT_READ: &str = "chat.read";
pub const CHAT_PARTICIPANT_ADDED: &str = "chat.participant_added";
pub const CHAT_PARTICIPANT_REMOVED: &str = "chat.participant_removed";

pub const CALL_RINGING: &str = "call.ringing";
pub const CALL_ANSWERED: &str = "call.answered";
pub const CALL_DECLINED: &str = "call.declined";
pub const CALL_MISSED: &str = "call.missed";
pub const CALL_ENDED: &str = "call.ended";
pub const CALL_PARTICIPANT_JOINED: &str = "call.participant_joined";
pub const CALL_PARTICIPANT_LEFT: &str = "call.participant_left";

pub const STATUS_POSTED: &str = "status.posted";
pub const STATUS_VIEWED: &str = "status.viewed";
