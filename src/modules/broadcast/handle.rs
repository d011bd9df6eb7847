use actix_web::{post, web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::{
    api::error,
    middlewares::get_claims,
    modules::{
        broadcast::{model::ChannelAuthRequest, service::ChannelAuthService},
        setting::handle::SettingSvc,
    },
};

/// Pusher clients post form data, custom clients JSON; the reply is the bare
/// `{"auth": ...}` object the Pusher protocol expects.
#[post("/auth")]
pub async fn channel_auth(
    auth_svc: web::Data<ChannelAuthService>,
    setting_svc: web::Data<SettingSvc>,
    body: web::Either<web::Json<ChannelAuthRequest>, web::Form<ChannelAuthRequest>>,
    req: HttpRequest,
) -> Result<HttpResponse, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let body = match body {
        web::Either::Left(json) => json.into_inner(),
        web::Either::Right(form) => form.into_inner(),
    };
    body.validate().map_err(|e| error::Error::BadRequest(e.to_string().into()))?;

    let config = setting_svc.broadcast_config().await;
    let auth = auth_svc.authorize(user_id, &body, config.pusher.as_ref()).await?;
    Ok(HttpResponse::Ok().json(auth))
}
