use actix_web::web::{scope, ServiceConfig};

use crate::modules::call::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/calls")
            .service(initiate_call)
            .service(get_call_logs)
            .service(get_call_statistics)
            .service(get_call)
            .service(answer_call)
            .service(decline_call)
            .service(end_call)
            .service(leave_call),
    );
}
