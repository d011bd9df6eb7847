use actix_web::{delete, get, patch, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        chat::repository_pg::ChatRepositoryPg,
        message::{
            model::{
                EditMessageRequest, GetMessageResponse, MessageQueryRequest, MessageView,
                ReactionRequest, ReactionSummary, SendMessageRequest,
            },
            repository_pg::MessageRepositoryPg,
            service::MessageService,
        },
    },
    utils::{ValidatedJson, ValidatedQuery},
};

pub type MessageSvc = MessageService<MessageRepositoryPg, ChatRepositoryPg>;

#[post("")]
pub async fn send_message(
    message_svc: web::Data<MessageSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<SendMessageRequest>,
    req: HttpRequest,
) -> Result<success::Success<MessageView>, error::Error> {
    let sender_id = get_claims(&req)?.sub;
    let message = message_svc.send(*chat_id, sender_id, body).await?;
    Ok(success::Success::created(Some(message)).message("Message sent successfully"))
}

#[get("")]
pub async fn get_messages(
    message_svc: web::Data<MessageSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedQuery(query): ValidatedQuery<MessageQueryRequest>,
    req: HttpRequest,
) -> Result<success::Success<GetMessageResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let page = message_svc.list(*chat_id, user_id, query.cursor, query.limit).await?;
    Ok(success::Success::ok(Some(page)).message("Successfully retrieved messages"))
}

#[patch("/{message_id}")]
pub async fn edit_message(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    ValidatedJson(body): ValidatedJson<EditMessageRequest>,
    req: HttpRequest,
) -> Result<success::Success<MessageView>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let message = message_svc.edit(*message_id, user_id, body.content).await?;
    Ok(success::Success::ok(Some(message)).message("Message edited successfully"))
}

#[delete("/{message_id}")]
pub async fn delete_message(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    req: HttpRequest,
) -> Result<success::Success<MessageView>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let message = message_svc.soft_delete(*message_id, user_id).await?;
    Ok(success::Success::ok(Some(message)).message("Message deleted successfully"))
}

#[post("/{message_id}/delivered")]
pub async fn mark_delivered(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    req: HttpRequest,
) -> Result<success::Success<MessageView>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let message = message_svc.mark_as_delivered(*message_id, user_id).await?;
    Ok(success::Success::ok(Some(message)))
}

#[post("/{message_id}/read")]
pub async fn mark_read(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    req: HttpRequest,
) -> Result<success::Success<MessageView>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let message = message_svc.mark_as_read(*message_id, user_id).await?;
    Ok(success::Success::ok(Some(message)))
}

#[post("/{message_id}/reactions")]
pub async fn add_reaction(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    ValidatedJson(body): ValidatedJson<ReactionRequest>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReactionSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let reactions = message_svc.react(*message_id, user_id, body.emoji).await?;
    Ok(success::Success::ok(Some(reactions)))
}

#[delete("/{message_id}/reactions")]
pub async fn remove_reaction(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    ValidatedJson(body): ValidatedJson<ReactionRequest>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReactionSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let reactions = message_svc.remove_reaction(*message_id, user_id, body.emoji).await?;
    Ok(success::Success::ok(Some(reactions)))
}

#[get("/{message_id}/reactions")]
pub async fn get_reactions(
    message_svc: web::Data<MessageSvc>,
    message_id: web::Path<i64>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ReactionSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let reactions = message_svc.reaction_summary(*message_id, user_id).await?;
    Ok(success::Success::ok(Some(reactions)))
}
