use uuid::Uuid;

use crate::{api::error, modules::contact::schema::ContactEntity};

#[async_trait::async_trait]
pub trait ContactRepository {
    async fn find_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<Option<ContactEntity>, error::SystemError>;

    async fn find_contacts(&self, owner_id: &Uuid) -> Result<Vec<ContactEntity>, error::SystemError>;

    /// Entries that `owner_ids` hold about `contact_id`.
    async fn find_entries_about(
        &self,
        contact_id: &Uuid,
        owner_ids: &[Uuid],
    ) -> Result<Vec<ContactEntity>, error::SystemError>;

    async fn create_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        nickname: Option<&str>,
    ) -> Result<ContactEntity, error::SystemError>;

    async fn delete_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<bool, error::SystemError>;

    /// Creates the entry when blocking someone not yet in the address book.
    async fn set_blocked(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        blocked: bool,
    ) -> Result<ContactEntity, error::SystemError>;

    async fn set_close_friend(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        close_friend: bool,
    ) -> Result<Option<ContactEntity>, error::SystemError>;
}
