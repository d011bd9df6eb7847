use actix_web::web::{scope, ServiceConfig};

use crate::modules::contact::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/contacts")
            .service(get_contacts)
            .service(add_contact)
            .service(remove_contact)
            .service(block_contact)
            .service(unblock_contact)
            .service(set_close_friend),
    );
}
