use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::contact::{
    by_outreach_date_desc, create_contact, update_contact, Contact, ContactPatch, NewContact,
    OutreachChannel, ENTITY,
};
use jobtrack_core::ports::{ContactRepository, RepositoryError, RepositoryResult};

use super::{bool_column, db_error, decode_error};
use crate::{parse_timestamp, to_rfc3339, StorageError};

const SELECT_CONTACTS: &str = "SELECT id, job_application_id, contact_name, contact_email, \
    channel, outreach_date, response_received, created_at, updated_at FROM contacts";

#[derive(Clone)]
pub struct SqliteContactRepository {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: Clock,
}

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: String,
    job_application_id: String,
    contact_name: String,
    contact_email: Option<String>,
    channel: String,
    outreach_date: String,
    response_received: i64,
    created_at: String,
    updated_at: String,
}

impl ContactRow {
    fn into_domain(self) -> Result<Contact, StorageError> {
        let channel: OutreachChannel = self
            .channel
            .parse()
            .map_err(|err: String| decode_error("channel", err))?;
        Ok(Contact {
            id: self.id,
            job_application_id: self.job_application_id,
            contact_name: self.contact_name,
            contact_email: self.contact_email,
            channel,
            outreach_date: parse_timestamp("outreach_date", &self.outreach_date)?,
            response_received: self.response_received != 0,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

impl SqliteContactRepository {
    pub(crate) fn new(pool: SqlitePool, ids: IdGenerator, clock: Clock) -> Self {
        Self { pool, ids, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn load(conn: &mut SqliteConnection, id: &str) -> RepositoryResult<Option<Contact>> {
        let sql = format!("{SELECT_CONTACTS} WHERE id = ?");
        let row = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_error)?;
        Ok(row.map(ContactRow::into_domain).transpose()?)
    }

    async fn fetch_where(&self, filter: Option<&str>) -> RepositoryResult<Vec<Contact>> {
        let rows = match filter {
            Some(job_application_id) => {
                let sql = format!("{SELECT_CONTACTS} WHERE job_application_id = ?");
                sqlx::query_as::<_, ContactRow>(&sql)
                    .bind(job_application_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, ContactRow>(SELECT_CONTACTS)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;

        let mut contacts = rows
            .into_iter()
            .map(ContactRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        contacts.sort_by(by_outreach_date_desc);
        Ok(contacts)
    }
}

#[async_trait]
impl ContactRepository for SqliteContactRepository {
    async fn create(&self, data: NewContact) -> RepositoryResult<Contact> {
        let contact = create_contact(data, &*self.ids, self.now())
            .map_err(|source| RepositoryError::create(ENTITY, source))?;

        sqlx::query(
            "INSERT INTO contacts \
             (id, job_application_id, contact_name, contact_email, channel, outreach_date, \
              response_received, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&contact.id)
        .bind(&contact.job_application_id)
        .bind(&contact.contact_name)
        .bind(&contact.contact_email)
        .bind(contact.channel.as_str())
        .bind(to_rfc3339(contact.outreach_date))
        .bind(bool_column(contact.response_received))
        .bind(to_rfc3339(contact.created_at))
        .bind(to_rfc3339(contact.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        info!(stage = "storage", backend = "sqlite", entity = ENTITY, id = %contact.id, "created");
        Ok(contact)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Contact> {
        debug!(stage = "storage", backend = "sqlite", entity = ENTITY, %id, "get by id");
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::load(&mut conn, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<Contact>> {
        self.fetch_where(Some(job_application_id)).await
    }

    async fn get_all(&self) -> RepositoryResult<Vec<Contact>> {
        self.fetch_where(None).await
    }

    async fn update(&self, id: &str, patch: ContactPatch) -> RepositoryResult<Contact> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let existing = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))?;
        let updated = update_contact(&existing, patch, self.now())
            .map_err(|source| RepositoryError::update(ENTITY, source))?;

        sqlx::query(
            "UPDATE contacts \
                SET contact_name = ?, contact_email = ?, channel = ?, outreach_date = ?, \
                    response_received = ?, updated_at = ? \
              WHERE id = ?",
        )
        .bind(&updated.contact_name)
        .bind(&updated.contact_email)
        .bind(updated.channel.as_str())
        .bind(to_rfc3339(updated.outreach_date))
        .bind(bool_column(updated.response_received))
        .bind(to_rfc3339(updated.updated_at))
        .bind(&updated.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        info!(stage = "storage", backend = "sqlite", entity = ENTITY, %id, "updated");
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        info!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            %id,
            removed = result.rows_affected() > 0,
            "deleted"
        );
        Ok(())
    }
}
