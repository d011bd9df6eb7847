use actix_web::web::{scope, ServiceConfig};

use crate::modules::message::handle::*;

/// Must be registered before the `/chats` scope so the nested path matches first.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope("/chats/{chat_id}/messages").service(send_message).service(get_messages))
        .service(
            scope("/messages")
                .service(edit_message)
                .service(delete_message)
                .service(mark_delivered)
                .service(mark_read)
                .service(add_reaction)
                .service(remove_reaction)
                .service(get_reactions),
        );
}
