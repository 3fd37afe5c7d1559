use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{next_updated_at, stamp};
use crate::error::{Issues, ValidationError};
use crate::validate;

pub const ENTITY: &str = "contact";

/// Medium used to reach out to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachChannel {
    Email,
    Linkedin,
    Phone,
    InPerson,
    Referral,
    Other,
}

impl OutreachChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Linkedin => "linkedin",
            Self::Phone => "phone",
            Self::InPerson => "in_person",
            Self::Referral => "referral",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for OutreachChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutreachChannel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Self::Email),
            "linkedin" => Ok(Self::Linkedin),
            "phone" => Ok(Self::Phone),
            "in_person" => Ok(Self::InPerson),
            "referral" => Ok(Self::Referral),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown outreach channel '{other}'")),
        }
    }
}

/// Person reached out to about a specific application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub job_application_id: String,
    pub contact_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    pub channel: OutreachChannel,
    pub outreach_date: DateTime<Utc>,
    pub response_received: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub job_application_id: String,
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    pub channel: OutreachChannel,
    pub outreach_date: String,
    #[serde(default)]
    pub response_received: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub channel: Option<OutreachChannel>,
    #[serde(default)]
    pub outreach_date: Option<String>,
    #[serde(default)]
    pub response_received: Option<bool>,
}

fn optional_email(issues: &mut Issues, value: Option<String>) -> Option<String> {
    validate::optional_text(value)
        .and_then(|email| issues.check(validate::email("contact_email", &email)))
}

pub fn create_contact(
    data: NewContact,
    ids: &dyn Fn() -> String,
    now: DateTime<Utc>,
) -> Result<Contact, ValidationError> {
    let mut issues = Issues::new();
    let job_application_id = issues.check(validate::non_empty(
        "job_application_id",
        &data.job_application_id,
    ));
    let contact_name = issues.check(validate::non_empty("contact_name", &data.contact_name));
    let contact_email = optional_email(&mut issues, data.contact_email);
    let outreach_date = issues.check(validate::iso_datetime("outreach_date", &data.outreach_date));

    match (job_application_id, contact_name, outreach_date) {
        (Some(job_application_id), Some(contact_name), Some(outreach_date))
            if issues.is_empty() =>
        {
            let now = stamp(now);
            Ok(Contact {
                id: ids(),
                job_application_id,
                contact_name,
                contact_email,
                channel: data.channel,
                outreach_date,
                response_received: data.response_received,
                created_at: now,
                updated_at: now,
            })
        }
        _ => Err(issues.into_error(ENTITY)),
    }
}

pub fn update_contact(
    existing: &Contact,
    patch: ContactPatch,
    now: DateTime<Utc>,
) -> Result<Contact, ValidationError> {
    let mut issues = Issues::new();
    let mut next = existing.clone();

    if let Some(name) = patch.contact_name {
        if let Some(value) = issues.check(validate::non_empty("contact_name", &name)) {
            next.contact_name = value;
        }
    }
    if patch.contact_email.is_some() {
        next.contact_email = optional_email(&mut issues, patch.contact_email);
    }
    if let Some(channel) = patch.channel {
        next.channel = channel;
    }
    if let Some(date) = patch.outreach_date {
        if let Some(value) = issues.check(validate::iso_datetime("outreach_date", &date)) {
            next.outreach_date = value;
        }
    }
    if let Some(received) = patch.response_received {
        next.response_received = received;
    }

    if !issues.is_empty() {
        return Err(issues.into_error(ENTITY));
    }
    next.updated_at = next_updated_at(existing.updated_at, now);
    Ok(next)
}

/// Most recent outreach first.
pub fn by_outreach_date_desc(a: &Contact, b: &Contact) -> Ordering {
    b.outreach_date
        .cmp(&a.outreach_date)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const APP_ID: &str = "00000000-0000-4000-8000-000000000001";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn create(data: NewContact) -> Result<Contact, ValidationError> {
        create_contact(data, &|| "contact-1".to_string(), now())
    }

    fn payload() -> NewContact {
        NewContact {
            job_application_id: APP_ID.into(),
            contact_name: "Jane Recruiter".into(),
            contact_email: Some("jane@acme.io".into()),
            channel: OutreachChannel::Linkedin,
            outreach_date: "2024-05-28".into(),
            response_received: false,
        }
    }

    #[test]
    fn create_uses_injected_id() {
        let contact = create(payload()).unwrap();
        assert_eq!(contact.id, "contact-1");
        assert_eq!(contact.created_at, contact.updated_at);
        assert_eq!(contact.job_application_id, APP_ID);
    }

    #[test]
    fn create_rejects_blank_reference_and_bad_email() {
        let data = NewContact {
            job_application_id: "   ".into(),
            contact_email: Some("jane".into()),
            ..payload()
        };
        let err = create(data).unwrap_err();
        assert!(err.has_issue_for("job_application_id"));
        assert!(err.has_issue_for("contact_email"));
    }

    #[test]
    fn contact_attaches_to_application_from_any_generator() {
        use crate::job_application::{create_job_application, NewJobApplication};

        let ids = || format!("app-{}", 7);
        let application = NewJobApplication {
            company: "Acme".into(),
            position_title: "Platform Engineer".into(),
            application_date: "2024-05-27".into(),
            ..NewJobApplication::default()
        };
        let app = create_job_application(application, &ids, now()).unwrap();

        let data = NewContact {
            job_application_id: app.id.clone(),
            ..payload()
        };
        let contact = create_contact(data, &ids, now()).unwrap();
        assert_eq!(contact.job_application_id, "app-7");
    }

    #[test]
    fn blank_email_is_treated_as_absent() {
        let data = NewContact {
            contact_email: Some("   ".into()),
            ..payload()
        };
        let contact = create(data).unwrap();
        assert_eq!(contact.contact_email, None);
    }

    #[test]
    fn update_marks_response_and_keeps_identity() {
        let contact = create(payload()).unwrap();
        let patch = ContactPatch {
            response_received: Some(true),
            channel: Some(OutreachChannel::Email),
            ..ContactPatch::default()
        };
        let updated = update_contact(&contact, patch, now()).unwrap();
        assert!(updated.response_received);
        assert_eq!(updated.channel, OutreachChannel::Email);
        assert_eq!(updated.id, contact.id);
        assert_eq!(updated.created_at, contact.created_at);
        assert!(updated.updated_at > contact.updated_at);
    }
}
