mod memory;
mod sqlite;

use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::ports::{
    ContactRepository, InterviewStageRepository, JobApplicationRepository, JobBoardRepository,
    RepositoryError,
};

pub use memory::{
    MemoryContactRepository, MemoryInterviewStageRepository, MemoryJobApplicationRepository,
    MemoryJobBoardRepository,
};
pub use sqlite::{
    SqliteContactRepository, SqliteInterviewStageRepository, SqliteJobApplicationRepository,
    SqliteJobBoardRepository,
};

/// Top-level database handle that owns the SQLite connection pool.
///
/// Clones share the pool, so every repository built from one `Database`
/// (or from two handles on the same file) observes the same rows.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(5000));

        // Every connection to `:memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        tracing::info!(stage = "storage", max_connections, "sqlite pool ready");
        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    pub fn job_applications(
        &self,
        ids: IdGenerator,
        clock: Clock,
    ) -> SqliteJobApplicationRepository {
        SqliteJobApplicationRepository::new(self.pool.clone(), ids, clock)
    }

    pub fn contacts(&self, ids: IdGenerator, clock: Clock) -> SqliteContactRepository {
        SqliteContactRepository::new(self.pool.clone(), ids, clock)
    }

    pub fn interview_stages(
        &self,
        ids: IdGenerator,
        clock: Clock,
    ) -> SqliteInterviewStageRepository {
        SqliteInterviewStageRepository::new(self.pool.clone(), ids, clock)
    }

    pub fn job_boards(&self, ids: IdGenerator, clock: Clock) -> SqliteJobBoardRepository {
        SqliteJobBoardRepository::new(self.pool.clone(), ids, clock)
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to decode {column}: {message}")]
    Decode {
        column: &'static str,
        message: String,
    },
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}

/// One handle per repository port, behind trait objects so callers never
/// depend on the adapter that was selected.
#[derive(Clone)]
pub struct Repositories {
    pub job_applications: Arc<dyn JobApplicationRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub interview_stages: Arc<dyn InterviewStageRepository>,
    pub job_boards: Arc<dyn JobBoardRepository>,
}

impl Repositories {
    /// Fresh, isolated in-memory stores.
    pub fn in_memory(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            job_applications: Arc::new(MemoryJobApplicationRepository::new(
                ids.clone(),
                clock.clone(),
            )),
            contacts: Arc::new(MemoryContactRepository::new(ids.clone(), clock.clone())),
            interview_stages: Arc::new(MemoryInterviewStageRepository::new(
                ids.clone(),
                clock.clone(),
            )),
            job_boards: Arc::new(MemoryJobBoardRepository::new(ids, clock)),
        }
    }

    /// Repositories backed by the tables of `database`.
    pub fn sqlite(database: &Database, ids: IdGenerator, clock: Clock) -> Self {
        Self {
            job_applications: Arc::new(database.job_applications(ids.clone(), clock.clone())),
            contacts: Arc::new(database.contacts(ids.clone(), clock.clone())),
            interview_stages: Arc::new(database.interview_stages(ids.clone(), clock.clone())),
            job_boards: Arc::new(database.job_boards(ids, clock)),
        }
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| StorageError::Decode {
            column,
            message: err.to_string(),
        })
}

fn parse_optional_timestamp(
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|raw| parse_timestamp(column, raw)).transpose()
}
