use actix_web::{delete, get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_claims,
    modules::{
        chat::{
            model::{
                AddParticipantRequest, ChatDetail, ChatSummary, MarkReadRequest, MuteRequest,
                NewChatRequest, ReadPosition, ToggleRequest, UnreadCountResponse,
            },
            repository_pg::ChatRepositoryPg,
            schema::{ChatParticipantEntity, ParticipantRole},
            service::ChatService,
        },
        message::repository_pg::MessageRepositoryPg,
        user::repository_pg::UserRepositoryPg,
    },
    utils::ValidatedJson,
};

pub type ChatSvc = ChatService<ChatRepositoryPg, MessageRepositoryPg, UserRepositoryPg>;

#[post("")]
pub async fn create_chat(
    chat_svc: web::Data<ChatSvc>,
    ValidatedJson(body): ValidatedJson<NewChatRequest>,
    req: HttpRequest,
) -> Result<success::Success<ChatDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let chat = chat_svc.create_chat(user_id, body).await?;
    Ok(success::Success::created(Some(chat)).message("Successfully created chat"))
}

#[get("")]
pub async fn get_chats(
    chat_svc: web::Data<ChatSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ChatSummary>>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let chats = chat_svc.list_for_user(user_id).await?;
    Ok(success::Success::ok(Some(chats)).message("Successfully retrieved chats"))
}

#[get("/{chat_id}")]
pub async fn get_chat(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ChatDetail>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let chat = chat_svc.get_chat(*chat_id, user_id).await?;
    Ok(success::Success::ok(Some(chat)).message("Successfully retrieved chat"))
}

#[delete("/{chat_id}")]
pub async fn delete_chat(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    chat_svc.delete_chat(*chat_id, user_id).await?;
    Ok(success::Success::no_content())
}

#[post("/{chat_id}/participants")]
pub async fn add_participant(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<AddParticipantRequest>,
    req: HttpRequest,
) -> Result<success::Success<bool>, error::Error> {
    let actor_id = get_claims(&req)?.sub;
    let added = chat_svc
        .add_participant(
            *chat_id,
            actor_id,
            body.user_id,
            body.role.unwrap_or(ParticipantRole::Member),
        )
        .await?;

    let message = if added { "Participant added" } else { "User is already a participant" };
    Ok(success::Success::ok(Some(added)).message(message))
}

#[delete("/{chat_id}/participants/{user_id}")]
pub async fn remove_participant(
    chat_svc: web::Data<ChatSvc>,
    path: web::Path<(Uuid, Uuid)>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let actor_id = get_claims(&req)?.sub;
    let (chat_id, user_id) = path.into_inner();
    chat_svc.remove_participant(chat_id, actor_id, user_id).await?;
    Ok(success::Success::no_content())
}

#[post("/{chat_id}/read")]
pub async fn mark_as_read(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    body: Option<ValidatedJson<MarkReadRequest>>,
    req: HttpRequest,
) -> Result<success::Success<ReadPosition>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let message_id = body.and_then(|ValidatedJson(b)| b.message_id);
    let position = chat_svc.mark_as_read(*chat_id, user_id, message_id).await?;
    Ok(success::Success::ok(Some(position)).message("Chat marked as read"))
}

#[get("/{chat_id}/unread")]
pub async fn get_unread_count(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<UnreadCountResponse>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let unread_count = chat_svc.get_unread_count(*chat_id, user_id).await?;
    Ok(success::Success::ok(Some(UnreadCountResponse { chat_id: *chat_id, unread_count })))
}

#[post("/{chat_id}/mute")]
pub async fn mute_chat(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<MuteRequest>,
    req: HttpRequest,
) -> Result<success::Success<ChatParticipantEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let membership = chat_svc.mute_chat(*chat_id, user_id, body.muted_until).await?;
    Ok(success::Success::ok(Some(membership)))
}

#[post("/{chat_id}/archive")]
pub async fn archive_chat(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ToggleRequest>,
    req: HttpRequest,
) -> Result<success::Success<ChatParticipantEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let membership = chat_svc.archive_chat(*chat_id, user_id, body.value).await?;
    Ok(success::Success::ok(Some(membership)))
}

#[post("/{chat_id}/pin")]
pub async fn pin_chat(
    chat_svc: web::Data<ChatSvc>,
    chat_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<ToggleRequest>,
    req: HttpRequest,
) -> Result<success::Success<ChatParticipantEntity>, error::Error> {
    let user_id = get_claims(&req)?.sub;
    let membership = chat_svc.pin_chat(*chat_id, user_id, body.value).await?;
    Ok(success::Success::ok(Some(membership)))
}
