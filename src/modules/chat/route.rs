use actix_web::web::{scope, ServiceConfig};

use crate::modules::chat::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/chats")
            .service(create_chat)
            .service(get_chats)
            .service(get_chat)
            .service(delete_chat)
            .service(add_participant)
            .service(remove_participant)
            .service(mark_as_read)
            .service(get_unread_count)
            .service(mute_chat)
            .service(archive_chat)
            .service(pin_chat),
    );
}
