//! Domain layer for the job application tracker.
//!
//! Entity modules validate "for-create"/"for-update" shapes into stamped
//! entities; [`ports`] describes the repositories those entities are stored
//! through; [`notes`] is the in-process note collection.

pub mod clock;
pub mod contact;
pub mod error;
pub mod ingest;
pub mod interview_stage;
pub mod job_application;
pub mod job_board;
pub mod note;
pub mod notes;
pub mod ports;
pub mod status;
pub mod validate;

pub use error::{FieldIssue, ValidationError};
pub use ports::{RepositoryError, RepositoryResult};
