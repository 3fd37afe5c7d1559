use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job_application::NewJobApplication;
use crate::status::StatusLabel;

/// Posting details scraped by the browser extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionPayload {
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub job_posting_url: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
}

impl ExtensionPayload {
    /// Maps the scraped posting to a new application dated `today`, starting as `applied`.
    pub fn into_new_application(self, today: DateTime<Utc>) -> NewJobApplication {
        NewJobApplication {
            company: self.company,
            position_title: self.position,
            application_date: today.date_naive().format("%Y-%m-%d").to_string(),
            interest_rating: None,
            next_event_date: None,
            job_posting_url: self.job_posting_url,
            job_description: self.job_description,
            status: Some(StatusLabel::Applied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn forces_applied_status_and_todays_date() {
        let payload: ExtensionPayload = serde_json::from_value(serde_json::json!({
            "company": "Acme",
            "position": "Platform Engineer",
            "job_posting_url": "https://boards.greenhouse.io/acme/jobs/1"
        }))
        .expect("payload parses");

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();
        let data = payload.into_new_application(now);
        assert_eq!(data.position_title, "Platform Engineer");
        assert_eq!(data.application_date, "2024-06-01");
        assert_eq!(data.status, Some(StatusLabel::Applied));
        assert_eq!(data.job_description, None);
    }
}
