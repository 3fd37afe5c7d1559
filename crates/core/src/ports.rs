//! Storage-independent repository contracts.
//!
//! Adapters live in the storage crate. Every adapter must behave the same way:
//! `create`/`update` validate through the entity modules, lookups by owner and
//! `get_all` succeed with an empty list when nothing matches, and `delete` is
//! idempotent.

use async_trait::async_trait;
use thiserror::Error;

use crate::contact::{Contact, ContactPatch, NewContact};
use crate::error::ValidationError;
use crate::interview_stage::{InterviewStage, InterviewStagePatch, NewInterviewStage};
use crate::job_application::{JobApplication, JobApplicationPatch, NewJobApplication};
use crate::job_board::{JobBoard, JobBoardPatch, NewJobBoard};
use crate::status::StatusLabel;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to create {entity}: {source}")]
    Create {
        entity: &'static str,
        source: ValidationError,
    },
    #[error("Failed to update {entity}: {source}")]
    Update {
        entity: &'static str,
        source: ValidationError,
    },
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn create(entity: &'static str, source: ValidationError) -> Self {
        Self::Create { entity, source }
    }

    pub fn update(entity: &'static str, source: ValidationError) -> Self {
        Self::Update { entity, source }
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Field diagnostics when the failure came from validation.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Create { source, .. } | Self::Update { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait JobApplicationRepository: Send + Sync {
    async fn create(&self, data: NewJobApplication) -> RepositoryResult<JobApplication>;
    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobApplication>;
    /// Most recent application date first.
    async fn get_all(&self) -> RepositoryResult<Vec<JobApplication>>;
    async fn update(
        &self,
        id: &str,
        patch: JobApplicationPatch,
    ) -> RepositoryResult<JobApplication>;
    /// Appends `label` to the status log.
    async fn update_status(&self, id: &str, label: StatusLabel) -> RepositoryResult<JobApplication>;
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, data: NewContact) -> RepositoryResult<Contact>;
    async fn get_by_id(&self, id: &str) -> RepositoryResult<Contact>;
    /// Contacts for an application, most recent outreach first.
    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<Contact>>;
    async fn get_all(&self) -> RepositoryResult<Vec<Contact>>;
    async fn update(&self, id: &str, patch: ContactPatch) -> RepositoryResult<Contact>;
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}

#[async_trait]
pub trait InterviewStageRepository: Send + Sync {
    async fn create(&self, data: NewInterviewStage) -> RepositoryResult<InterviewStage>;
    async fn get_by_id(&self, id: &str) -> RepositoryResult<InterviewStage>;
    /// Stages for an application, ordered by round.
    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<InterviewStage>>;
    async fn get_all(&self) -> RepositoryResult<Vec<InterviewStage>>;
    async fn update(
        &self,
        id: &str,
        patch: InterviewStagePatch,
    ) -> RepositoryResult<InterviewStage>;
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}

#[async_trait]
pub trait JobBoardRepository: Send + Sync {
    async fn create(&self, data: NewJobBoard) -> RepositoryResult<JobBoard>;
    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobBoard>;
    /// Boards sorted by name.
    async fn get_all(&self) -> RepositoryResult<Vec<JobBoard>>;
    /// Root-domain matches take precedence over secondary domain lists.
    async fn find_by_domain(&self, domain: &str) -> RepositoryResult<Option<JobBoard>>;
    async fn update(&self, id: &str, patch: JobBoardPatch) -> RepositoryResult<JobBoard>;
    async fn delete(&self, id: &str) -> RepositoryResult<()>;
}
