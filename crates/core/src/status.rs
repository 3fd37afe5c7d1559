//! Application status labels, their derived categories, and the append-only status log.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Whether a status keeps the application in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Active,
    Inactive,
}

impl StatusCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Closed set of pipeline stages an application can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLabel {
    Applied,
    ScreeningInterview,
    Interview,
    Onsite,
    OnlineTest,
    TakeHomeAssignment,
    Offer,
    Rejected,
    NoResponse,
    NoLongerInterested,
    HiringFreeze,
}

impl StatusLabel {
    pub const ALL: [StatusLabel; 11] = [
        Self::Applied,
        Self::ScreeningInterview,
        Self::Interview,
        Self::Onsite,
        Self::OnlineTest,
        Self::TakeHomeAssignment,
        Self::Offer,
        Self::Rejected,
        Self::NoResponse,
        Self::NoLongerInterested,
        Self::HiringFreeze,
    ];

    const ACTIVE: [StatusLabel; 7] = [
        Self::Applied,
        Self::ScreeningInterview,
        Self::Interview,
        Self::Onsite,
        Self::OnlineTest,
        Self::TakeHomeAssignment,
        Self::Offer,
    ];

    /// Human readable label, also used as the wire and database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::ScreeningInterview => "screening interview",
            Self::Interview => "interview",
            Self::Onsite => "onsite",
            Self::OnlineTest => "online test",
            Self::TakeHomeAssignment => "take-home assignment",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::NoResponse => "no response",
            Self::NoLongerInterested => "no longer interested",
            Self::HiringFreeze => "hiring freeze",
        }
    }

    pub fn category(self) -> StatusCategory {
        if Self::ACTIVE.contains(&self) {
            StatusCategory::Active
        } else {
            StatusCategory::Inactive
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for StatusLabel {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

impl Serialize for StatusLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StatusLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A label paired with its derived category.
///
/// Construct through [`create_application_status`]; the category is never accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawStatus")]
pub struct ApplicationStatus {
    category: StatusCategory,
    label: StatusLabel,
}

impl ApplicationStatus {
    pub fn category(&self) -> StatusCategory {
        self.category
    }

    pub fn label(&self) -> StatusLabel {
        self.label
    }

    pub fn is_active(&self) -> bool {
        matches!(self.category, StatusCategory::Active)
    }
}

/// Maps a label to its `{category, label}` pair.
pub fn create_application_status(label: StatusLabel) -> ApplicationStatus {
    ApplicationStatus {
        category: label.category(),
        label,
    }
}

#[derive(Deserialize)]
struct RawStatus {
    category: StatusCategory,
    label: StatusLabel,
}

impl TryFrom<RawStatus> for ApplicationStatus {
    type Error = String;

    fn try_from(raw: RawStatus) -> Result<Self, Self::Error> {
        let status = create_application_status(raw.label);
        if status.category != raw.category {
            return Err(format!(
                "status '{}' belongs to category '{}', not '{}'",
                raw.label,
                status.category.as_str(),
                raw.category.as_str()
            ));
        }
        Ok(status)
    }
}

/// One entry of the status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub at: DateTime<Utc>,
    pub status: ApplicationStatus,
}

/// Insertion-ordered, non-empty, append-only history of status changes.
///
/// There is no way to edit or remove entries; [`StatusLog::appended`] returns a new log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StatusEntry>", into = "Vec<StatusEntry>")]
pub struct StatusLog(Vec<StatusEntry>);

impl StatusLog {
    /// Starts a log with its initial status.
    pub fn new(at: DateTime<Utc>, status: ApplicationStatus) -> Self {
        Self(vec![StatusEntry { at, status }])
    }

    /// Returns a copy of the log with `status` appended.
    ///
    /// The entry timestamp is clamped so it never precedes the previous entry.
    pub fn appended(&self, at: DateTime<Utc>, status: ApplicationStatus) -> Self {
        let at = at.max(self.latest().at);
        let mut entries = Vec::with_capacity(self.0.len() + 1);
        entries.extend_from_slice(&self.0);
        entries.push(StatusEntry { at, status });
        Self(entries)
    }

    pub fn latest(&self) -> &StatusEntry {
        // The constructor and `TryFrom` both guarantee at least one entry.
        &self.0[self.0.len() - 1]
    }

    pub fn current(&self) -> ApplicationStatus {
        self.latest().status
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Error returned when rebuilding a log from stored entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusLogError {
    #[error("status log must contain at least one entry")]
    Empty,
    #[error("status log entry {0} is older than the entry before it")]
    OutOfOrder(usize),
}

impl TryFrom<Vec<StatusEntry>> for StatusLog {
    type Error = StatusLogError;

    fn try_from(entries: Vec<StatusEntry>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err(StatusLogError::Empty);
        }
        if let Some(index) = entries.windows(2).position(|pair| pair[1].at < pair[0].at) {
            return Err(StatusLogError::OutOfOrder(index + 1));
        }
        Ok(Self(entries))
    }
}

impl From<StatusLog> for Vec<StatusEntry> {
    fn from(log: StatusLog) -> Self {
        log.0
    }
}
