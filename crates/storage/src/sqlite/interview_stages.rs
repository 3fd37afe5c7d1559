use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::interview_stage::{
    by_round_asc, create_interview_stage, update_interview_stage, InterviewStage,
    InterviewStagePatch, InterviewType, NewInterviewStage, ENTITY,
};
use jobtrack_core::ports::{InterviewStageRepository, RepositoryError, RepositoryResult};

use super::{bool_column, db_error, decode_error};
use crate::{parse_optional_timestamp, parse_timestamp, to_rfc3339, StorageError};

const SELECT_STAGES: &str = "SELECT id, job_application_id, round, interview_type, is_final_round, \
    scheduled_date, notes, questions_json, created_at, updated_at FROM interview_stages";

/// Repository over `interview_stages`. Questions are kept as a JSON array column.
#[derive(Clone)]
pub struct SqliteInterviewStageRepository {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: Clock,
}

#[derive(Debug, sqlx::FromRow)]
struct InterviewStageRow {
    id: String,
    job_application_id: String,
    round: i64,
    interview_type: String,
    is_final_round: i64,
    scheduled_date: Option<String>,
    notes: Option<String>,
    questions_json: String,
    created_at: String,
    updated_at: String,
}

impl InterviewStageRow {
    fn into_domain(self) -> Result<InterviewStage, StorageError> {
        let interview_type: InterviewType = self
            .interview_type
            .parse()
            .map_err(|err: String| decode_error("interview_type", err))?;
        let round = u32::try_from(self.round).map_err(|err| decode_error("round", err))?;
        let questions: Vec<String> = serde_json::from_str(&self.questions_json)
            .map_err(|err| decode_error("questions_json", err))?;

        Ok(InterviewStage {
            id: self.id,
            job_application_id: self.job_application_id,
            round,
            interview_type,
            is_final_round: self.is_final_round != 0,
            scheduled_date: parse_optional_timestamp(
                "scheduled_date",
                self.scheduled_date.as_deref(),
            )?,
            notes: self.notes,
            questions,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

fn questions_json(stage: &InterviewStage) -> RepositoryResult<String> {
    serde_json::to_string(&stage.questions)
        .map_err(|err| RepositoryError::Storage(format!("failed to encode questions: {err}")))
}

impl SqliteInterviewStageRepository {
    pub(crate) fn new(pool: SqlitePool, ids: IdGenerator, clock: Clock) -> Self {
        Self { pool, ids, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn load(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> RepositoryResult<Option<InterviewStage>> {
        let sql = format!("{SELECT_STAGES} WHERE id = ?");
        let row = sqlx::query_as::<_, InterviewStageRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_error)?;
        Ok(row.map(InterviewStageRow::into_domain).transpose()?)
    }

    async fn fetch_where(&self, filter: Option<&str>) -> RepositoryResult<Vec<InterviewStage>> {
        let rows = match filter {
            Some(job_application_id) => {
                let sql = format!("{SELECT_STAGES} WHERE job_application_id = ?");
                sqlx::query_as::<_, InterviewStageRow>(&sql)
                    .bind(job_application_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, InterviewStageRow>(SELECT_STAGES)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;

        let mut stages = rows
            .into_iter()
            .map(InterviewStageRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        stages.sort_by(by_round_asc);
        Ok(stages)
    }
}

#[async_trait]
impl InterviewStageRepository for SqliteInterviewStageRepository {
    async fn create(&self, data: NewInterviewStage) -> RepositoryResult<InterviewStage> {
        let stage = create_interview_stage(data, &*self.ids, self.now())
            .map_err(|source| RepositoryError::create(ENTITY, source))?;

        sqlx::query(
            "INSERT INTO interview_stages \
             (id, job_application_id, round, interview_type, is_final_round, scheduled_date, \
              notes, questions_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stage.id)
        .bind(&stage.job_application_id)
        .bind(i64::from(stage.round))
        .bind(stage.interview_type.as_str())
        .bind(bool_column(stage.is_final_round))
        .bind(stage.scheduled_date.map(to_rfc3339))
        .bind(&stage.notes)
        .bind(questions_json(&stage)?)
        .bind(to_rfc3339(stage.created_at))
        .bind(to_rfc3339(stage.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        info!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            id = %stage.id,
            round = stage.round,
            "created"
        );
        Ok(stage)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<InterviewStage> {
        debug!(stage = "storage", backend = "sqlite", entity = ENTITY, %id, "get by id");
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::load(&mut conn, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<InterviewStage>> {
        self.fetch_where(Some(job_application_id)).await
    }

    async fn get_all(&self) -> RepositoryResult<Vec<InterviewStage>> {
        self.fetch_where(None).await
    }

    async fn update(
        &self,
        id: &str,
        patch: InterviewStagePatch,
    ) -> RepositoryResult<InterviewStage> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let existing = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))?;
        let updated = update_interview_stage(&existing, patch, self.now())
            .map_err(|source| RepositoryError::update(ENTITY, source))?;

        sqlx::query(
            "UPDATE interview_stages \
                SET round = ?, interview_type = ?, is_final_round = ?, scheduled_date = ?, \
                    notes = ?, questions_json = ?, updated_at = ? \
              WHERE id = ?",
        )
        .bind(i64::from(updated.round))
        .bind(updated.interview_type.as_str())
        .bind(bool_column(updated.is_final_round))
        .bind(updated.scheduled_date.map(to_rfc3339))
        .bind(&updated.notes)
        .bind(questions_json(&updated)?)
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
        let result = sqlx::query("DELETE FROM interview_stages WHERE id = ?")
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
