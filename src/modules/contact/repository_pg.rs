use uuid::Uuid;

use crate::{
    api::error,
    modules::contact::{repository::ContactRepository, schema::ContactEntity},
};

#[derive(Clone)]
pub struct ContactRepositoryPg {
    pool: sqlx::PgPool,
}

impl ContactRepositoryPg {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContactRepository for ContactRepositoryPg {
    async fn find_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<Option<ContactEntity>, error::SystemError> {
        let contact = sqlx::query_as::<_, ContactEntity>(
            "SELECT * FROM contacts WHERE owner_id = $1 AND contact_id = $2",
        )
        .bind(owner_id)
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contact)
    }

    async fn find_contacts(&self, owner_id: &Uuid) -> Result<Vec<ContactEntity>, error::SystemError> {
        let contacts = sqlx::query_as::<_, ContactEntity>(
            r#"
            SELECT * FROM contacts
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }

    async fn find_entries_about(
        &self,
        contact_id: &Uuid,
        owner_ids: &[Uuid],
    ) -> Result<Vec<ContactEntity>, error::SystemError> {
        if owner_ids.is_empty() {
            return Ok(vec![]);
        }

        let entries = sqlx::query_as::<_, ContactEntity>(
            "SELECT * FROM contacts WHERE contact_id = $1 AND owner_id = ANY($2)",
        )
        .bind(contact_id)
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn create_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        nickname: Option<&str>,
    ) -> Result<ContactEntity, error::SystemError> {
        let contact = sqlx::query_as::<_, ContactEntity>(
            r#"
            INSERT INTO contacts (owner_id, contact_id, nickname)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(contact_id)
        .bind(nickname)
        .fetch_one(&self.pool)
        .await?;
        Ok(contact)
    }

    async fn delete_contact(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query("DELETE FROM contacts WHERE owner_id = $1 AND contact_id = $2")
            .bind(owner_id)
            .bind(contact_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_blocked(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        blocked: bool,
    ) -> Result<ContactEntity, error::SystemError> {
        let contact = sqlx::query_as::<_, ContactEntity>(
            r#"
            INSERT INTO contacts (owner_id, contact_id, is_blocked)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT contacts_owner_contact
            DO UPDATE SET is_blocked = EXCLUDED.is_blocked
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(contact_id)
        .bind(blocked)
        .fetch_one(&self.pool)
        .await?;
        Ok(contact)
    }

    async fn set_close_friend(
        &self,
        owner_id: &Uuid,
        contact_id: &Uuid,
        close_friend: bool,
    ) -> Result<Option<ContactEntity>, error::SystemError> {
        let contact = sqlx::query_as::<_, ContactEntity>(
            r#"
            UPDATE contacts
            SET is_close_friend = $3
            WHERE owner_id = $1 AND contact_id = $2
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(contact_id)
        .bind(close_friend)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contact)
    }
}
