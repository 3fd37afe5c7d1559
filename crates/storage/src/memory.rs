//! Map-backed reference adapters.
//!
//! Each repository owns its own map; two instances never see each other's
//! writes. `update` runs its read-merge-write under a single lock, so
//! concurrent patches to one id are applied one after the other and the last
//! one wins on any field both touch.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use jobtrack_core::clock::{Clock, IdGenerator};
use jobtrack_core::contact::{self, Contact, ContactPatch, NewContact};
use jobtrack_core::error::ValidationError;
use jobtrack_core::interview_stage::{self, InterviewStage, InterviewStagePatch, NewInterviewStage};
use jobtrack_core::job_application::{self, JobApplication, JobApplicationPatch, NewJobApplication};
use jobtrack_core::job_board::{self, JobBoard, JobBoardPatch, NewJobBoard};
use jobtrack_core::ports::{
    ContactRepository, InterviewStageRepository, JobApplicationRepository, JobBoardRepository,
    RepositoryError, RepositoryResult,
};
use jobtrack_core::status::StatusLabel;

trait Keyed {
    fn key(&self) -> &str;
}

macro_rules! keyed_by_id {
    ($($entity:ty),+) => {
        $(impl Keyed for $entity {
            fn key(&self) -> &str {
                &self.id
            }
        })+
    };
}

keyed_by_id!(JobApplication, Contact, InterviewStage, JobBoard);

struct MemoryStore<T> {
    entity: &'static str,
    items: Mutex<HashMap<String, T>>,
    ids: IdGenerator,
    clock: Clock,
}

impl<T: Clone + Keyed> MemoryStore<T> {
    fn new(entity: &'static str, ids: IdGenerator, clock: Clock) -> Self {
        Self {
            entity,
            items: Mutex::new(HashMap::new()),
            ids,
            clock,
        }
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn create(
        &self,
        build: impl FnOnce(&dyn Fn() -> String, DateTime<Utc>) -> Result<T, ValidationError>,
    ) -> RepositoryResult<T> {
        let entity = build(&*self.ids, self.now())
            .map_err(|source| RepositoryError::create(self.entity, source))?;
        let id = entity.key().to_string();
        info!(stage = "storage", backend = "memory", entity = self.entity, %id, "created");
        self.items().insert(id, entity.clone());
        Ok(entity)
    }

    fn get(&self, id: &str) -> RepositoryResult<T> {
        debug!(stage = "storage", backend = "memory", entity = self.entity, %id, "get by id");
        self.items()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(self.entity, id))
    }

    fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.items()
            .values()
            .filter(|item| keep(item))
            .cloned()
            .collect()
    }

    fn update(
        &self,
        id: &str,
        merge: impl FnOnce(&T, DateTime<Utc>) -> Result<T, ValidationError>,
    ) -> RepositoryResult<T> {
        let now = self.now();
        let mut items = self.items();
        let existing = items
            .get(id)
            .ok_or_else(|| RepositoryError::not_found(self.entity, id))?;
        let updated = merge(existing, now)
            .map_err(|source| RepositoryError::update(self.entity, source))?;
        items.insert(id.to_string(), updated.clone());
        info!(stage = "storage", backend = "memory", entity = self.entity, %id, "updated");
        Ok(updated)
    }

    fn delete(&self, id: &str) {
        let removed = self.items().remove(id).is_some();
        info!(stage = "storage", backend = "memory", entity = self.entity, %id, removed, "deleted");
    }
}

pub struct MemoryJobApplicationRepository {
    store: MemoryStore<JobApplication>,
}

impl MemoryJobApplicationRepository {
    pub fn new(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            store: MemoryStore::new(job_application::ENTITY, ids, clock),
        }
    }
}

#[async_trait]
impl JobApplicationRepository for MemoryJobApplicationRepository {
    async fn create(&self, data: NewJobApplication) -> RepositoryResult<JobApplication> {
        self.store
            .create(|ids, now| job_application::create_job_application(data, ids, now))
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobApplication> {
        self.store.get(id)
    }

    async fn get_all(&self) -> RepositoryResult<Vec<JobApplication>> {
        let mut apps = self.store.filtered(|_| true);
        apps.sort_by(job_application::by_application_date_desc);
        Ok(apps)
    }

    async fn update(
        &self,
        id: &str,
        patch: JobApplicationPatch,
    ) -> RepositoryResult<JobApplication> {
        self.store.update(id, |existing, now| {
            job_application::update_job_application(existing, patch, now)
        })
    }

    async fn update_status(
        &self,
        id: &str,
        label: StatusLabel,
    ) -> RepositoryResult<JobApplication> {
        self.store.update(id, |existing, now| {
            Ok(job_application::append_status(existing, label, now))
        })
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete(id);
        Ok(())
    }
}

pub struct MemoryContactRepository {
    store: MemoryStore<Contact>,
}

impl MemoryContactRepository {
    pub fn new(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            store: MemoryStore::new(contact::ENTITY, ids, clock),
        }
    }
}

#[async_trait]
impl ContactRepository for MemoryContactRepository {
    async fn create(&self, data: NewContact) -> RepositoryResult<Contact> {
        self.store
            .create(|ids, now| contact::create_contact(data, ids, now))
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Contact> {
        self.store.get(id)
    }

    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<Contact>> {
        let mut contacts = self
            .store
            .filtered(|c| c.job_application_id == job_application_id);
        contacts.sort_by(contact::by_outreach_date_desc);
        Ok(contacts)
    }

    async fn get_all(&self) -> RepositoryResult<Vec<Contact>> {
        let mut contacts = self.store.filtered(|_| true);
        contacts.sort_by(contact::by_outreach_date_desc);
        Ok(contacts)
    }

    async fn update(&self, id: &str, patch: ContactPatch) -> RepositoryResult<Contact> {
        self.store
            .update(id, |existing, now| contact::update_contact(existing, patch, now))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete(id);
        Ok(())
    }
}

pub struct MemoryInterviewStageRepository {
    store: MemoryStore<InterviewStage>,
}

impl MemoryInterviewStageRepository {
    pub fn new(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            store: MemoryStore::new(interview_stage::ENTITY, ids, clock),
        }
    }
}

#[async_trait]
impl InterviewStageRepository for MemoryInterviewStageRepository {
    async fn create(&self, data: NewInterviewStage) -> RepositoryResult<InterviewStage> {
        self.store
            .create(|ids, now| interview_stage::create_interview_stage(data, ids, now))
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<InterviewStage> {
        self.store.get(id)
    }

    async fn get_by_job_application_id(
        &self,
        job_application_id: &str,
    ) -> RepositoryResult<Vec<InterviewStage>> {
        let mut stages = self
            .store
            .filtered(|stage| stage.job_application_id == job_application_id);
        stages.sort_by(interview_stage::by_round_asc);
        Ok(stages)
    }

    async fn get_all(&self) -> RepositoryResult<Vec<InterviewStage>> {
        let mut stages = self.store.filtered(|_| true);
        stages.sort_by(interview_stage::by_round_asc);
        Ok(stages)
    }

    async fn update(
        &self,
        id: &str,
        patch: InterviewStagePatch,
    ) -> RepositoryResult<InterviewStage> {
        self.store.update(id, |existing, now| {
            interview_stage::update_interview_stage(existing, patch, now)
        })
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete(id);
        Ok(())
    }
}

pub struct MemoryJobBoardRepository {
    store: MemoryStore<JobBoard>,
}

impl MemoryJobBoardRepository {
    pub fn new(ids: IdGenerator, clock: Clock) -> Self {
        Self {
            store: MemoryStore::new(job_board::ENTITY, ids, clock),
        }
    }

    fn sorted(&self) -> Vec<JobBoard> {
        let mut boards = self.store.filtered(|_| true);
        boards.sort_by(job_board::by_name);
        boards
    }
}

#[async_trait]
impl JobBoardRepository for MemoryJobBoardRepository {
    async fn create(&self, data: NewJobBoard) -> RepositoryResult<JobBoard> {
        self.store
            .create(|ids, now| job_board::create_job_board(data, ids, now))
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<JobBoard> {
        self.store.get(id)
    }

    async fn get_all(&self) -> RepositoryResult<Vec<JobBoard>> {
        Ok(self.sorted())
    }

    async fn find_by_domain(&self, domain: &str) -> RepositoryResult<Option<JobBoard>> {
        let boards = self.sorted();
        Ok(job_board::match_domain(&boards, domain).cloned())
    }

    async fn update(&self, id: &str, patch: JobBoardPatch) -> RepositoryResult<JobBoard> {
        self.store
            .update(id, |existing, now| job_board::update_job_board(existing, patch, now))
    }

    async fn delete(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete(id);
        Ok(())
    }
}
