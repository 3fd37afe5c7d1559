use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{next_updated_at, stamp};
use crate::error::{Issues, ValidationError};
use crate::validate;

pub const ENTITY: &str = "job board";

/// A site job postings are found on, matched by host name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBoard {
    pub id: String,
    pub name: String,
    pub root_domain: String,
    pub domains: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJobBoard {
    pub name: String,
    pub root_domain: String,
    #[serde(default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBoardPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root_domain: Option<String>,
    /// Replaces the whole domain list.
    #[serde(default)]
    pub domains: Option<Vec<String>>,
}

/// Normalizes every entry and drops repeats, keeping first occurrences.
fn domains(issues: &mut Issues, values: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if let Some(domain) = issues.check(validate::domain("domains", &value)) {
            if !normalized.contains(&domain) {
                normalized.push(domain);
            }
        }
    }
    normalized
}

pub fn create_job_board(
    data: NewJobBoard,
    ids: &dyn Fn() -> String,
    now: DateTime<Utc>,
) -> Result<JobBoard, ValidationError> {
    let mut issues = Issues::new();
    let name = issues.check(validate::non_empty("name", &data.name));
    let root_domain = issues.check(validate::domain("root_domain", &data.root_domain));
    let domains = domains(&mut issues, data.domains);

    match (name, root_domain) {
        (Some(name), Some(root_domain)) if issues.is_empty() => {
            let now = stamp(now);
            Ok(JobBoard {
                id: ids(),
                name,
                root_domain,
                domains,
                created_at: now,
                updated_at: now,
            })
        }
        _ => Err(issues.into_error(ENTITY)),
    }
}

pub fn update_job_board(
    existing: &JobBoard,
    patch: JobBoardPatch,
    now: DateTime<Utc>,
) -> Result<JobBoard, ValidationError> {
    let mut issues = Issues::new();
    let mut next = existing.clone();

    if let Some(name) = patch.name {
        if let Some(value) = issues.check(validate::non_empty("name", &name)) {
            next.name = value;
        }
    }
    if let Some(root_domain) = patch.root_domain {
        if let Some(value) = issues.check(validate::domain("root_domain", &root_domain)) {
            next.root_domain = value;
        }
    }
    if let Some(values) = patch.domains {
        next.domains = domains(&mut issues, values);
    }

    if !issues.is_empty() {
        return Err(issues.into_error(ENTITY));
    }
    next.updated_at = next_updated_at(existing.updated_at, now);
    Ok(next)
}

pub fn by_name(a: &JobBoard, b: &JobBoard) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

/// Picks the board serving `domain`.
///
/// Every board's `root_domain` is checked before any `domains` list. Boards
/// are expected in [`by_name`] order so ties resolve to the first name.
pub fn match_domain<'a>(boards: &'a [JobBoard], domain: &str) -> Option<&'a JobBoard> {
    let wanted = validate::normalize_domain(domain);
    if wanted.is_empty() {
        return None;
    }
    boards
        .iter()
        .find(|board| board.root_domain == wanted)
        .or_else(|| {
            boards
                .iter()
                .find(|board| board.domains.iter().any(|candidate| *candidate == wanted))
        })
}
