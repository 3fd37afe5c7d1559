//! Table-backed adapters.
//!
//! Mutations run inside a transaction: the current row is loaded, merged
//! through the entity module, and written back, so a failed validation leaves
//! the stored row untouched.

mod contacts;
mod interview_stages;
mod job_applications;
mod job_boards;

use std::fmt;

use jobtrack_core::ports::RepositoryError;

use crate::StorageError;

pub use contacts::SqliteContactRepository;
pub use interview_stages::SqliteInterviewStageRepository;
pub use job_applications::SqliteJobApplicationRepository;
pub use job_boards::SqliteJobBoardRepository;

fn db_error(err: sqlx::Error) -> RepositoryError {
    StorageError::Database(err).into()
}

fn decode_error(column: &'static str, err: impl fmt::Display) -> StorageError {
    StorageError::Decode {
        column,
        message: err.to_string(),
    }
}

fn bool_column(value: bool) -> i64 {
    i64::from(value)
}
