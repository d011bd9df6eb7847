use actix_web::web::{scope, ServiceConfig};

use crate::modules::broadcast::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(scope("/broadcasting").service(channel_auth));
}
