use actix_web::{delete, get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        contact::repository_pg::ContactRepositoryPg,
        status::{
            model::{
                ExtendStatusRequest, PostStatusRequest, StatusFeedEntry, StatusResponse,
                StatusViewer, StatusWithViews, ViewOutcome,
            },
            repository_pg::StatusRepositoryPg,
            schema::StatusEntity,
            service::StatusService,
        },
        user::repository_pg::UserRepositoryPg,
    },
    utils::ValidatedJson,
};

pub type StatusSvc = StatusService<StatusRepositoryPg, ContactRepositoryPg, UserRepositoryPg>;

#[post("")]
pub async fn post_status(
    status_svc: web::Data<StatusSvc>,
    ValidatedJson(body): ValidatedJson<PostStatusRequest>,
    req: HttpRequest,
) -> Result<success::Success<StatusEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let status = status_svc.post(user_id, body).await?;
    Ok(success::Success::created(Some(status)).message("Status posted successfully"))
}

#[get("/me")]
pub async fn get_my_statuses(
    status_svc: web::Data<StatusSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<StatusWithViews>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let statuses = status_svc.get_my_statuses(user_id).await?;
    Ok(success::Success::ok(Some(statuses)))
}

#[get("/feed")]
pub async fn get_feed(
    status_svc: web::Data<StatusSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<StatusFeedEntry>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let feed = status_svc.get_recent_from_contacts(user_id).await?;
    Ok(success::Success::ok(Some(feed)))
}

#[get("/{status_id}")]
pub async fn get_status(
    status_svc: web::Data<StatusSvc>,
    status_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<StatusResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let status = status_svc.get_status(*status_id, user_id).await?;
    Ok(success::Success::ok(Some(status)))
}

#[post("/{status_id}/view")]
pub async fn view_status(
    status_svc: web::Data<StatusSvc>,
    status_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ViewOutcome>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let outcome = status_svc.mark_viewed_by(*status_id, user_id).await?;
    Ok(success::Success::ok(Some(outcome)))
}

#[get("/{status_id}/viewers")]
pub async fn get_viewers(
    status_svc: web::Data<StatusSvc>,
    status_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<Vec<StatusViewer>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let viewers = status_svc.get_viewers(*status_id, user_id).await?;
    Ok(success::Success::ok(Some(viewers)))
}

#[post("/{status_id}/extend")]
pub async fn extend_status(
    status_svc: web::Data<StatusSvc>,
    status_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ExtendStatusRequest>,
    req: HttpRequest,
) -> Result<success::Success<StatusEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let status = status_svc.extend(*status_id, user_id, body.hours).await?;
    Ok(success::Success::ok(Some(status)).message("Status extended"))
}

#[delete("/{status_id}")]
pub async fn delete_status(
    status_svc: web::Data<StatusSvc>,
    status_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    status_svc.delete(*status_id, user_id).await?;
    Ok(success::Success::no_content())
}
