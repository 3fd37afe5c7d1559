use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::job_application::{
    append_status, by_application_date_desc, create_job_application, update_job_application,
    JobApplication, JobApplicationPatch, NewJobApplication, ENTITY,
};
use jobtrack_core::ports::{JobApplicationRepository, RepositoryError, RepositoryResult};
use jobtrack_core::status::{create_application_status, StatusEntry, StatusLabel, StatusLog};

use super::{db_error, decode_error};
use crate::{parse_optional_timestamp, parse_timestamp, to_rfc3339, StorageError};

const SELECT_APPLICATIONS: &str = "SELECT id, company, position_title, application_date, \
    interest_rating, next_event_date, job_posting_url, job_description, created_at, updated_at \
    FROM job_applications";

/// Repository storing applications in `job_applications`, with their history
/// in the append-only `application_status_entries` table.
#[derive(Clone)]
pub struct SqliteJobApplicationRepository {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: Clock,
}

#[derive(Debug, sqlx::FromRow)]
struct JobApplicationRow {
    id: String,
    company: String,
    position_title: String,
    application_date: String,
    interest_rating: Option<i64>,
    next_event_date: Option<String>,
    job_posting_url: Option<String>,
    job_description: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct StatusEntryRow {
    application_id: String,
    recorded_at: String,
    category: String,
    label: String,
}

impl StatusEntryRow {
    fn into_domain(self) -> Result<StatusEntry, StorageError> {
        let label: StatusLabel = self
            .label
            .parse()
            .map_err(|source| decode_error("label", source))?;
        let status = create_application_status(label);
        if status.category().as_str() != self.category {
            return Err(decode_error(
                "category",
                format!("'{}' does not match label '{}'", self.category, label),
            ));
        }
        Ok(StatusEntry {
            at: parse_timestamp("recorded_at", &self.recorded_at)?,
            status,
        })
    }
}

impl JobApplicationRow {
    fn into_domain(self, entries: Vec<StatusEntryRow>) -> Result<JobApplication, StorageError> {
        let entries = entries
            .into_iter()
            .map(StatusEntryRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        let status_log =
            StatusLog::try_from(entries).map_err(|err| decode_error("status_log", err))?;
        let interest_rating = self
            .interest_rating
            .map(u8::try_from)
            .transpose()
            .map_err(|err| decode_error("interest_rating", err))?;

        Ok(JobApplication {
            id: self.id,
            company: self.company,
            position_title: self.position_title,
            application_date: parse_timestamp("application_date", &self.application_date)?,
            interest_rating,
            next_event_date: parse_optional_timestamp(
                "next_event_date",
                self.next_event_date.as_deref(),
            )?,
            job_posting_url: self.job_posting_url,
            job_description: self.job_description,
            status_log,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

impl SqliteJobApplicationRepository {
    pub(crate) fn new(pool: SqlitePool, ids: IdGenerator, clock: Clock) -> Self {
        Self { pool, ids, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn load(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> RepositoryResult<Option<JobApplication>> {
        let sql = format!("{SELECT_APPLICATIONS} WHERE id = ?");
        let row = sqlx::query_as::<_, JobApplicationRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entries = sqlx::query_as::<_, StatusEntryRow>(
            "SELECT application_id, recorded_at, category, label \
               FROM application_status_entries WHERE application_id = ? ORDER BY seq",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

        Ok(Some(row.into_domain(entries)?))
    }

    /// Inserts `entries` as log positions `first_seq..`.
    async fn insert_entries(
        conn: &mut SqliteConnection,
        application_id: &str,
        entries: &[StatusEntry],
        first_seq: usize,
    ) -> RepositoryResult<()> {
        for (offset, entry) in entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO application_status_entries \
                 (application_id, seq, recorded_at, category, label) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(application_id)
            .bind((first_seq + offset) as i64)
            .bind(to_rfc3339(entry.at))
            .bind(entry.status.category().as_str())
            .bind(entry.status.label().as_str())
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    /// Writes the updated row and appends only the log entries `existing` did not have.
    async fn save(
        conn: &mut SqliteConnection,
        existing: &JobApplication,
        updated: &JobApplication,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE job_applications \
                SET company = ?, position_title = ?, application_date = ?, interest_rating = ?, \
                    next_event_date = ?, job_posting_url = ?, job_description = ?, updated_at = ? \
              WHERE id = ?",
        )
        .bind(&updated.company)
        .bind(&updated.position_title)
        .bind(to_rfc3339(updated.application_date))
        .bind(updated.interest_rating.map(i64::from))
        .bind(updated.next_event_date.map(to_rfc3339))
        .bind(&updated.job_posting_url)
        .bind(&updated.job_description)
        .bind(to_rfc3339(updated.updated_at))
        .bind(&updated.id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

        let known = existing.status_log.len();
        let appended = &updated.status_log.entries()[known..];
        Self::insert_entries(conn, &updated.id, appended, known).await
    }

    async fn modify<F>(&self, id: &str, merge: F) -> RepositoryResult<JobApplication>
    where
        F: FnOnce(&JobApplication, DateTime<Utc>) -> RepositoryResult<JobApplication> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let existing = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))?;
        let updated = merge(&existing, self.now())?;
        Self::save(&mut tx, &existing, &updated).await?;
        tx.commit().await.map_err(db_error)?;

        info!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            %id,
            status = %updated.status().label(),
            log_len = updated.status_log.len(),
            "updated"
        );
        Ok(updated)
    }
}

#[async_trait]
impl JobApplicationRepository for SqliteJobApplicationRepository {
    async fn create(&self, data: NewJobApplication) -> RepositoryResult<JobApplication> {
        let app = create_job_application(data, &*self.ids, self.now())
            .map_err(|source| RepositoryError::create(ENTITY, source))?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            "INSERT INTO job_applications \
             (id, company, position_title, application_date, interest_rating, next_event_date, \
              job_posting_url, job_description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&app.id)
        .bind(&app.company)
        .bind(&app.position_title)
        .bind(to_rfc3339(app.application_date))
        .bind(app.interest_rating.map(i64::from))
        .bind(app.next_event_date.map(to_rfc3339))
        .bind(&app.job_posting_url)
        .bind(&app.job_description)
        .bind(to_rfc3339(app.created_at))
        .bind(to_rfc3339(app.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        Self::insert_entries(&mut tx, &app.id, app.status_log.entries(), 0).await?;
        tx.commit().await.map_err(db_error)?;

        info!(stage = "storage", backend = "sqlite", entity = ENTITY, id = %app.id, "created");
        Ok(app)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobApplication> {
        debug!(stage = "storage", backend = "sqlite", entity = ENTITY, %id, "get by id");
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::load(&mut conn, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn get_all(&self) -> RepositoryResult<Vec<JobApplication>> {
        let rows = sqlx::query_as::<_, JobApplicationRow>(SELECT_APPLICATIONS)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let entry_rows = sqlx::query_as::<_, StatusEntryRow>(
            "SELECT application_id, recorded_at, category, label \
               FROM application_status_entries ORDER BY application_id, seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut entries: HashMap<String, Vec<StatusEntryRow>> = HashMap::new();
        for entry in entry_rows {
            entries
                .entry(entry.application_id.clone())
                .or_default()
                .push(entry);
        }

        let mut apps = rows
            .into_iter()
            .map(|row| {
                let history = entries.remove(&row.id).unwrap_or_default();
                row.into_domain(history)
            })
            .collect::<Result<Vec<_>, _>>()?;
        apps.sort_by(by_application_date_desc);
        debug!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            count = apps.len(),
            "get all"
        );
        Ok(apps)
    }

    async fn update(
        &self,
        id: &str,
        patch: JobApplicationPatch,
    ) -> RepositoryResult<JobApplication> {
        self.modify(id, |existing, now| {
            update_job_application(existing, patch, now)
                .map_err(|source| RepositoryError::update(ENTITY, source))
        })
        .await
    }

    async fn update_status(
        &self,
        id: &str,
        label: StatusLabel,
    ) -> RepositoryResult<JobApplication> {
        self.modify(id, |existing, now| Ok(append_status(existing, label, now)))
            .await
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM job_applications WHERE id = ?")
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
