use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use crate::{
    api::error,
    modules::{
        contact::{model::ContactResponse, repository::ContactRepository, schema::ContactEntity},
        user::repository::UserRepository,
    },
};

#[derive(Clone)]
pub struct ContactService<R, U>
where
    R: ContactRepository + Send + Sync,
    U: UserRepository + Send + Sync,
{
    contact_repo: Arc<R>,
    user_repo: Arc<U>,
}

impl<R, U> ContactService<R, U>
where
    R: ContactRepository + Send + Sync,
    U: UserRepository + Send + Sync,
{
    pub fn with_dependencies(contact_repo: Arc<R>, user_repo: Arc<U>) -> Self {
        ContactService { contact_repo, user_repo }
    }

    pub async fn get_contacts(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ContactResponse>, error::SystemError> {
        let contacts = self.contact_repo.find_contacts(&owner_id).await?;
        let ids: Vec<Uuid> = contacts.iter().map(|c| c.contact_id).collect();
        let users: HashMap<Uuid, _> = self
            .user_repo
            .find_summaries(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(contacts
            .into_iter()
            .filter_map(|c| {
                users.get(&c.contact_id).cloned().map(|user| ContactResponse {
                    user,
                    nickname: c.nickname,
                    is_blocked: c.is_blocked,
                    is_close_friend: c.is_close_friend,
                    created_at: c.created_at,
                })
            })
            .collect())
    }

    pub async fn add_contact(
        &self,
        owner_id: Uuid,
        contact_id: Uuid,
        nickname: Option<String>,
    ) -> Result<ContactEntity, error::SystemError> {
        if owner_id == contact_id {
            return Err(error::SystemError::bad_request("Cannot add yourself as a contact"));
        }

        if !self.user_repo.exists(&contact_id).await? {
            return Err(error::SystemError::not_found("User not found"));
        }

        if self.contact_repo.find_contact(&owner_id, &contact_id).await?.is_some() {
            return Err(error::SystemError::conflict("Contact already exists"));
        }

        let contact =
            self.contact_repo.create_contact(&owner_id, &contact_id, nickname.as_deref()).await?;
        log::info!("User {} added contact {}", owner_id, contact_id);
        Ok(contact)
    }

    pub async fn remove_contact(
        &self,
        owner_id: Uuid,
        contact_id: Uuid,
    ) -> Result<(), error::SystemError> {
        if !self.contact_repo.delete_contact(&owner_id, &contact_id).await? {
            return Err(error::SystemError::not_found("Contact not found"));
        }
        Ok(())
    }

    pub async fn block(
        &self,
        owner_id: Uuid,
        contact_id: Uuid,
    ) -> Result<ContactEntity, error::SystemError> {
        if owner_id == contact_id {
            return Err(error::SystemError::bad_request("Cannot block yourself"));
        }
        if !self.user_repo.exists(&contact_id).await? {
            return Err(error::SystemError::not_found("User not found"));
        }

        let contact = self.contact_repo.set_blocked(&owner_id, &contact_id, true).await?;
        log::info!("User {} blocked {}", owner_id, contact_id);
        Ok(contact)
    }

    pub async fn unblock(
        &self,
        owner_id: Uuid,
        contact_id: Uuid,
    ) -> Result<ContactEntity, error::SystemError> {
        if self.contact_repo.find_contact(&owner_id, &contact_id).await?.is_none() {
            return Err(error::SystemError::not_found("Contact not found"));
        }
        self.contact_repo.set_blocked(&owner_id, &contact_id, false).await
    }

    pub async fn set_close_friend(
        &self,
        owner_id: Uuid,
        contact_id: Uuid,
        close_friend: bool,
    ) -> Result<ContactEntity, error::SystemError> {
        self.contact_repo
            .set_close_friend(&owner_id, &contact_id, close_friend)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Contact not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::MemoryStore;

    fn service(store: &MemoryStore) -> ContactService<MemoryStore, MemoryStore> {
        ContactService::with_dependencies(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_add_contact_rules() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;

        let err = svc.add_contact(alice, alice, None).await.unwrap_err();
        assert!(matches!(err, error::SystemError::BadRequest(_)));

        let err = svc.add_contact(alice, Uuid::now_v7(), None).await.unwrap_err();
        assert!(matches!(err, error::SystemError::NotFound(_)));

        svc.add_contact(alice, bob, Some("Bobby".into())).await.unwrap();
        let err = svc.add_contact(alice, bob, None).await.unwrap_err();
        assert!(matches!(err, error::SystemError::ConflictMessage(_)));

        let contacts = svc.get_contacts(alice).await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].user.id, bob);
        assert_eq!(contacts[0].nickname.as_deref(), Some("Bobby"));

        // contacts are directed
        assert!(svc.get_contacts(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_block_and_close_friend_flags() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let alice = store.add_user("alice").await;
        let bob = store.add_user("bob").await;
        let carol = store.add_user("carol").await;

        let err = svc.set_close_friend(alice, bob, true).await.unwrap_err();
        assert!(matches!(err, error::SystemError::NotFound(_)));

        svc.add_contact(alice, bob, None).await.unwrap();
        assert!(svc.set_close_friend(alice, bob, true).await.unwrap().is_close_friend);

        // blocking a stranger creates the entry
        assert!(svc.block(alice, carol).await.unwrap().is_blocked);
        assert!(!svc.unblock(alice, carol).await.unwrap().is_blocked);

        svc.remove_contact(alice, bob).await.unwrap();
        let err = svc.remove_contact(alice, bob).await.unwrap_err();
        assert!(matches!(err, error::SystemError::NotFound(_)));
    }
}
