use actix_web::{
    middleware::from_fn,
    web::{scope, ServiceConfig},
};

use crate::{
    middlewares::authorization,
    modules::{setting::handle::*, user::schema::UserRole},
};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/settings")
            .wrap(from_fn(authorization(vec![UserRole::Admin])))
            .service(get_settings)
            .service(reload_broadcast)
            .service(update_setting)
            .service(delete_setting),
    );
}
