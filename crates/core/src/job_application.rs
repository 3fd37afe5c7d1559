use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{next_updated_at, stamp};
use crate::error::{Issues, ValidationError};
use crate::status::{create_application_status, ApplicationStatus, StatusLabel, StatusLog};
use crate::validate;

pub const ENTITY: &str = "job application";

/// An application to a single position, with its full status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    pub company: String,
    pub position_title: String,
    pub application_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_event_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_posting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    pub status_log: StatusLog,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobApplication {
    /// Status of the most recent log entry.
    pub fn status(&self) -> ApplicationStatus {
        self.status_log.current()
    }

    /// An application is overdue when its next event has passed while it is still active.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.next_event_date {
            Some(next) => next < now && self.status().is_active(),
            None => false,
        }
    }
}

/// Fields accepted when creating an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewJobApplication {
    pub company: String,
    pub position_title: String,
    pub application_date: String,
    #[serde(default)]
    pub interest_rating: Option<i64>,
    #[serde(default)]
    pub next_event_date: Option<String>,
    #[serde(default)]
    pub job_posting_url: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    /// Initial status; defaults to `applied`.
    #[serde(default)]
    pub status: Option<StatusLabel>,
}

/// Partial update of an application. `status` appends to the log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobApplicationPatch {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position_title: Option<String>,
    #[serde(default)]
    pub application_date: Option<String>,
    #[serde(default)]
    pub interest_rating: Option<i64>,
    #[serde(default)]
    pub next_event_date: Option<String>,
    #[serde(default)]
    pub job_posting_url: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub status: Option<StatusLabel>,
}

impl JobApplicationPatch {
    pub fn status(label: StatusLabel) -> Self {
        Self {
            status: Some(label),
            ..Self::default()
        }
    }
}

/// Validates `data` and stamps a new application with a fresh id and `now`.
pub fn create_job_application(
    data: NewJobApplication,
    ids: &dyn Fn() -> String,
    now: DateTime<Utc>,
) -> Result<JobApplication, ValidationError> {
    let mut issues = Issues::new();
    let company = issues.check(validate::non_empty("company", &data.company));
    let position_title = issues.check(validate::non_empty("position_title", &data.position_title));
    let application_date = issues.check(validate::iso_datetime(
        "application_date",
        &data.application_date,
    ));
    let interest_rating = data
        .interest_rating
        .and_then(|value| issues.check(validate::interest_rating("interest_rating", value)));
    let next_event_date = validate::optional_text(data.next_event_date)
        .and_then(|value| issues.check(validate::iso_datetime("next_event_date", &value)));

    match (company, position_title, application_date) {
        (Some(company), Some(position_title), Some(application_date)) if issues.is_empty() => {
            let now = stamp(now);
            let initial = create_application_status(data.status.unwrap_or(StatusLabel::Applied));
            Ok(JobApplication {
                id: ids(),
                company,
                position_title,
                application_date,
                interest_rating,
                next_event_date,
                job_posting_url: validate::optional_text(data.job_posting_url),
                job_description: validate::optional_text(data.job_description),
                status_log: StatusLog::new(now, initial),
                created_at: now,
                updated_at: now,
            })
        }
        _ => Err(issues.into_error(ENTITY)),
    }
}

/// Merges `patch` onto `existing`, returning the updated copy.
pub fn update_job_application(
    existing: &JobApplication,
    patch: JobApplicationPatch,
    now: DateTime<Utc>,
) -> Result<JobApplication, ValidationError> {
    let mut issues = Issues::new();
    let mut next = existing.clone();

    if let Some(company) = patch.company {
        if let Some(value) = issues.check(validate::non_empty("company", &company)) {
            next.company = value;
        }
    }
    if let Some(position_title) = patch.position_title {
        if let Some(value) = issues.check(validate::non_empty("position_title", &position_title)) {
            next.position_title = value;
        }
    }
    if let Some(date) = patch.application_date {
        if let Some(value) = issues.check(validate::iso_datetime("application_date", &date)) {
            next.application_date = value;
        }
    }
    if let Some(rating) = patch.interest_rating {
        if let Some(value) = issues.check(validate::interest_rating("interest_rating", rating)) {
            next.interest_rating = Some(value);
        }
    }
    if let Some(date) = patch.next_event_date {
        if let Some(value) = issues.check(validate::iso_datetime("next_event_date", &date)) {
            next.next_event_date = Some(value);
        }
    }
    if let Some(url) = patch.job_posting_url {
        next.job_posting_url = validate::optional_text(Some(url));
    }
    if let Some(description) = patch.job_description {
        next.job_description = validate::optional_text(Some(description));
    }

    if !issues.is_empty() {
        return Err(issues.into_error(ENTITY));
    }

    next.updated_at = next_updated_at(existing.updated_at, now);
    if let Some(label) = patch.status {
        next.status_log = existing
            .status_log
            .appended(next.updated_at, create_application_status(label));
    }
    Ok(next)
}

/// Appends `label` to a copy of the application's log.
pub fn append_status(
    existing: &JobApplication,
    label: StatusLabel,
    now: DateTime<Utc>,
) -> JobApplication {
    let updated_at = next_updated_at(existing.updated_at, now);
    JobApplication {
        status_log: existing
            .status_log
            .appended(updated_at, create_application_status(label)),
        updated_at,
        ..existing.clone()
    }
}

/// Most recent application first.
pub fn by_application_date_desc(a: &JobApplication, b: &JobApplication) -> Ordering {
    b.application_date
        .cmp(&a.application_date)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCategory;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn payload() -> NewJobApplication {
        NewJobApplication {
            company: "Acme".into(),
            position_title: "Backend Engineer".into(),
            application_date: "2024-05-30".into(),
            interest_rating: Some(2),
            ..NewJobApplication::default()
        }
    }

    fn created() -> JobApplication {
        create_job_application(payload(), &|| "app-1".to_string(), now()).unwrap()
    }

    #[test]
    fn create_stamps_id_timestamps_and_initial_status() {
        let app = created();
        assert_eq!(app.id, "app-1");
        assert_eq!(app.created_at, app.updated_at);
        assert_eq!(app.status_log.len(), 1);
        assert_eq!(app.status().label(), StatusLabel::Applied);
        assert_eq!(app.status().category(), StatusCategory::Active);
        assert_eq!(
            app.application_date.to_rfc3339(),
            "2024-05-30T00:00:00+00:00"
        );
    }

    #[test]
    fn create_honors_requested_initial_status() {
        let data = NewJobApplication {
            status: Some(StatusLabel::ScreeningInterview),
            ..payload()
        };
        let app = create_job_application(data, &|| "app-2".to_string(), now()).unwrap();
        assert_eq!(app.status().label(), StatusLabel::ScreeningInterview);
    }

    #[test]
    fn create_reports_every_invalid_field() {
        let data = NewJobApplication {
            company: "  ".into(),
            position_title: String::new(),
            application_date: "yesterday".into(),
            interest_rating: Some(5),
            next_event_date: Some("soon".into()),
            ..NewJobApplication::default()
        };
        let err = create_job_application(data, &|| "app-3".to_string(), now()).unwrap_err();
        for field in [
            "company",
            "position_title",
            "application_date",
            "interest_rating",
            "next_event_date",
        ] {
            assert!(err.has_issue_for(field), "missing issue for {field}");
        }
    }

    #[test]
    fn update_preserves_identity_and_advances_updated_at() {
        let app = created();
        let patch = JobApplicationPatch {
            company: Some("Acme Corp".into()),
            ..JobApplicationPatch::default()
        };
        let updated = update_job_application(&app, patch, now()).unwrap();
        assert_eq!(updated.id, app.id);
        assert_eq!(updated.created_at, app.created_at);
        assert!(updated.updated_at > app.updated_at);
        assert_eq!(updated.company, "Acme Corp");
        assert_eq!(updated.status_log, app.status_log);
    }

    #[test]
    fn invalid_update_changes_nothing() {
        let app = created();
        let patch = JobApplicationPatch {
            company: Some("Acme Corp".into()),
            interest_rating: Some(0),
            ..JobApplicationPatch::default()
        };
        let err = update_job_application(&app, patch, now()).unwrap_err();
        assert!(err.has_issue_for("interest_rating"));
        assert_eq!(app.company, "Acme");
    }

    #[test]
    fn status_patch_appends_to_a_new_log() {
        let app = created();
        let later = now() + Duration::hours(1);
        let patch = JobApplicationPatch::status(StatusLabel::Interview);
        let updated = update_job_application(&app, patch, later).unwrap();

        assert_eq!(app.status_log.len(), 1);
        assert_eq!(updated.status_log.len(), 2);
        assert_eq!(updated.status_log.entries()[0], app.status_log.entries()[0]);
        assert_eq!(updated.status().label(), StatusLabel::Interview);
        assert_eq!(updated.status_log.latest().at, later);
    }

    #[test]
    fn append_status_keeps_timestamps_monotonic() {
        let app = created();
        let first = append_status(&app, StatusLabel::Onsite, now());
        let second = append_status(&first, StatusLabel::Offer, now() - Duration::days(1));
        let entries = second.status_log.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|pair| pair[0].at <= pair[1].at));
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn overdue_only_while_active() {
        let mut app = created();
        app.next_event_date = Some(now() - Duration::days(1));
        assert!(app.is_overdue(now()));

        let rejected = append_status(&app, StatusLabel::Rejected, now());
        assert!(!rejected.is_overdue(now()));

        app.next_event_date = Some(now() + Duration::days(1));
        assert!(!app.is_overdue(now()));
    }

    #[test]
    fn sorts_most_recent_application_first() {
        let mut older = created();
        older.id = "a".into();
        let mut newer = created();
        newer.id = "b".into();
        newer.application_date = older.application_date + Duration::days(3);

        let mut apps = vec![older.clone(), newer.clone()];
        apps.sort_by(by_application_date_desc);
        assert_eq!(apps[0].id, "b");
    }
}
