use actix_web::{get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        call::{
            model::{CallDetail, CallLogEntry, CallLogQuery, CallStatistics, InitiateCallRequest},
            repository_pg::CallRepositoryPg,
            schema::CallEntity,
            service::CallService,
        },
        chat::repository_pg::ChatRepositoryPg,
        user::repository_pg::UserRepositoryPg,
    },
    utils::{ValidatedJson, ValidatedQuery},
};

pub type CallSvc = CallService<CallRepositoryPg, ChatRepositoryPg, UserRepositoryPg>;

#[post("")]
pub async fn initiate_call(
    call_svc: web::Data<CallSvc>,
    ValidatedJson(body): ValidatedJson<InitiateCallRequest>,
    req: HttpRequest,
) -> Result<success::Success<CallDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.initiate(user_id, body).await?;
    Ok(success::Success::created(Some(call)).message("Call initiated"))
}

#[get("/logs")]
pub async fn get_call_logs(
    call_svc: web::Data<CallSvc>,
    ValidatedQuery(query): ValidatedQuery<CallLogQuery>,
    req: HttpRequest,
) -> Result<success::Success<Vec<CallLogEntry>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let logs = call_svc.get_logs_for_user(user_id, query.limit).await?;
    Ok(success::Success::ok(Some(logs)).message("Successfully retrieved call logs"))
}

#[get("/statistics")]
pub async fn get_call_statistics(
    call_svc: web::Data<CallSvc>,
    req: HttpRequest,
) -> Result<success::Success<CallStatistics>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let stats = call_svc.get_statistics(user_id).await?;
    Ok(success::Success::ok(Some(stats)).message("Successfully retrieved call statistics"))
}

#[get("/{call_id}")]
pub async fn get_call(
    call_svc: web::Data<CallSvc>,
    call_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<CallDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.get_call(*call_id, user_id).await?;
    Ok(success::Success::ok(Some(call)))
}

#[post("/{call_id}/answer")]
pub async fn answer_call(
    call_svc: web::Data<CallSvc>,
    call_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<CallEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.answer(*call_id, user_id).await?;
    Ok(success::Success::ok(Some(call)).message("Call answered"))
}

#[post("/{call_id}/decline")]
pub async fn decline_call(
    call_svc: web::Data<CallSvc>,
    call_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<CallEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.decline(*call_id, user_id).await?;
    Ok(success::Success::ok(Some(call)).message("Call declined"))
}

#[post("/{call_id}/end")]
pub async fn end_call(
    call_svc: web::Data<CallSvc>,
    call_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<CallEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.end(*call_id, user_id).await?;
    Ok(success::Success::ok(Some(call)).message("Call ended"))
}

#[post("/{call_id}/leave")]
pub async fn leave_call(
    call_svc: web::Data<CallSvc>,
    call_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<CallEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let call = call_svc.leave(*call_id, user_id).await?;
    Ok(success::Success::ok(Some(call)).message("Left call"))
}
