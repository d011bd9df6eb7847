use actix_web::{delete, get, post, web, HttpRequest};
use uuid::Uuid;

use crate::{
    api::{error, success},
    middlewares::get_extensions,
    modules::{
        contact::{
            model::{AddContactRequest, CloseFriendRequest, ContactResponse},
            repository_pg::ContactRepositoryPg,
            schema::ContactEntity,
            service::ContactService,
        },
        user::repository_pg::UserRepositoryPg,
    },
    utils::{Claims, ValidatedJson},
};

pub type ContactSvc = ContactService<ContactRepositoryPg, UserRepositoryPg>;

#[get("")]
pub async fn get_contacts(
    contact_service: web::Data<ContactSvc>,
    req: HttpRequest,
) -> Result<success::Success<Vec<ContactResponse>>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    let contacts = contact_service.get_contacts(user_id).await?;
    Ok(success::Success::ok(Some(contacts)).message("Successfully retrieved contacts"))
}

#[post("")]
pub async fn add_contact(
    contact_service: web::Data<ContactSvc>,
    ValidatedJson(body): ValidatedJson<AddContactRequest>,
    req: HttpRequest,
) -> Result<success::Success<ContactEntity>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    let contact = contact_service.add_contact(user_id, body.contact_id, body.nickname).await?;
    Ok(success::Success::created(Some(contact)).message("Contact added successfully"))
}

#[delete("/{contact_id}")]
pub async fn remove_contact(
    contact_service: web::Data<ContactSvc>,
    contact_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<()>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    contact_service.remove_contact(user_id, *contact_id).await?;
    Ok(success::Success::no_content())
}

#[post("/{contact_id}/block")]
pub async fn block_contact(
    contact_service: web::Data<ContactSvc>,
    contact_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ContactEntity>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    let contact = contact_service.block(user_id, *contact_id).await?;
    Ok(success::Success::ok(Some(contact)).message("User blocked"))
}

#[post("/{contact_id}/unblock")]
pub async fn unblock_contact(
    contact_service: web::Data<ContactSvc>,
    contact_id: web::Path<Uuid>,
    req: HttpRequest,
) -> Result<success::Success<ContactEntity>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    let contact = contact_service.unblock(user_id, *contact_id).await?;
    Ok(success::Success::ok(Some(contact)).message("User unblocked"))
}

#[post("/{contact_id}/close-friend")]
pub async fn set_close_friend(
    contact_service: web::Data<ContactSvc>,
    contact_id: web::Path<Uuid>,
    ValidatedJson(body): ValidatedJson<CloseFriendRequest>,
    req: HttpRequest,
) -> Result<success::Success<ContactEntity>, error::Error> {
    let user_id = get_extensions::<Claims>(&req)?.sub;
    let contact = contact_service.set_close_friend(user_id, *contact_id, body.value).await?;
    Ok(success::Success::ok(Some(contact)))
}
