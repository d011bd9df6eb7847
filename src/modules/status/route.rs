use actix_web::web::{scope, ServiceConfig};

use crate::modules::status::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    // fixed segments before `/{status_id}`
    cfg.service(
        scope("/status")
            .service(post_status)
            .service(get_my_statuses)
            .service(get_feed)
            .service(get_status)
            .service(view_status)
            .service(get_viewers)
            .service(extend_status)
            .service(delete_status),
    );
}
