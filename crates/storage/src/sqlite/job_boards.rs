use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::job_board::{
    by_name, create_job_board, match_domain, update_job_board, JobBoard, JobBoardPatch, NewJobBoard,
    ENTITY,
};
use jobtrack_core::ports::{JobBoardRepository, RepositoryError, RepositoryResult};

use super::{db_error, decode_error};
use crate::{parse_timestamp, to_rfc3339, StorageError};

const SELECT_BOARDS: &str =
    "SELECT id, name, root_domain, domains_json, created_at, updated_at FROM job_boards";

#[derive(Clone)]
pub struct SqliteJobBoardRepository {
    pool: SqlitePool,
    ids: IdGenerator,
    clock: Clock,
}

#[derive(Debug, sqlx::FromRow)]
struct JobBoardRow {
    id: String,
    name: String,
    root_domain: String,
    domains_json: String,
    created_at: String,
    updated_at: String,
}

impl JobBoardRow {
    fn into_domain(self) -> Result<JobBoard, StorageError> {
        let domains: Vec<String> = serde_json::from_str(&self.domains_json)
            .map_err(|err| decode_error("domains_json", err))?;
        Ok(JobBoard {
            id: self.id,
            name: self.name,
            root_domain: self.root_domain,
            domains,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

fn domains_json(board: &JobBoard) -> RepositoryResult<String> {
    serde_json::to_string(&board.domains)
        .map_err(|err| RepositoryError::Storage(format!("failed to encode domains: {err}")))
}

impl SqliteJobBoardRepository {
    pub(crate) fn new(pool: SqlitePool, ids: IdGenerator, clock: Clock) -> Self {
        Self { pool, ids, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn load(conn: &mut SqliteConnection, id: &str) -> RepositoryResult<Option<JobBoard>> {
        let sql = format!("{SELECT_BOARDS} WHERE id = ?");
        let row = sqlx::query_as::<_, JobBoardRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(db_error)?;
        Ok(row.map(JobBoardRow::into_domain).transpose()?)
    }

    async fn sorted(&self) -> RepositoryResult<Vec<JobBoard>> {
        let rows = sqlx::query_as::<_, JobBoardRow>(SELECT_BOARDS)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let mut boards = rows
            .into_iter()
            .map(JobBoardRow::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        boards.sort_by(by_name);
        Ok(boards)
    }
}

#[async_trait]
impl JobBoardRepository for SqliteJobBoardRepository {
    async fn create(&self, data: NewJobBoard) -> RepositoryResult<JobBoard> {
        let board = create_job_board(data, &*self.ids, self.now())
            .map_err(|source| RepositoryError::create(ENTITY, source))?;

        sqlx::query(
            "INSERT INTO job_boards (id, name, root_domain, domains_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&board.id)
        .bind(&board.name)
        .bind(&board.root_domain)
        .bind(domains_json(&board)?)
        .bind(to_rfc3339(board.created_at))
        .bind(to_rfc3339(board.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        info!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            id = %board.id,
            root_domain = %board.root_domain,
            "created"
        );
        Ok(board)
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobBoard> {
        debug!(stage = "storage", backend = "sqlite", entity = ENTITY, %id, "get by id");
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        Self::load(&mut conn, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    async fn get_all(&self) -> RepositoryResult<Vec<JobBoard>> {
        self.sorted().await
    }

    /// Domain lists live in a JSON column, so matching happens over the loaded
    /// boards with the same rules the in-memory adapter uses.
    async fn find_by_domain(&self, domain: &str) -> RepositoryResult<Option<JobBoard>> {
        let boards = self.sorted().await?;
        let found = match_domain(&boards, domain).cloned();
        debug!(
            stage = "storage",
            backend = "sqlite",
            entity = ENTITY,
            %domain,
            matched = found.is_some(),
            "find by domain"
        );
        Ok(found)
    }

    async fn update(&self, id: &str, patch: JobBoardPatch) -> RepositoryResult<JobBoard> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let existing = Self::load(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))?;
        let updated = update_job_board(&existing, patch, self.now())
            .map_err(|source| RepositoryError::update(ENTITY, source))?;

        sqlx::query(
            "UPDATE job_boards SET name = ?, root_domain = ?, domains_json = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.root_domain)
        .bind(domains_json(&updated)?)
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
        let result = sqlx::query("DELETE FROM job_boards WHERE id = ?")
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
