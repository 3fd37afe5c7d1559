use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{next_updated_at, stamp};
use crate::error::{Issues, ValidationError};
use crate::validate;

pub const ENTITY: &str = "note";

/// Free-standing text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default)]
    pub content: Option<String>,
}

pub fn create_note(
    data: NewNote,
    ids: &dyn Fn() -> String,
    now: DateTime<Utc>,
) -> Result<Note, ValidationError> {
    let mut issues = Issues::new();
    match issues.check(validate::non_empty("content", &data.content)) {
        Some(content) => {
            let now = stamp(now);
            Ok(Note {
                id: ids(),
                content,
                created_at: now,
                updated_at: now,
            })
        }
        None => Err(issues.into_error(ENTITY)),
    }
}

pub fn update_note(
    existing: &Note,
    patch: NotePatch,
    now: DateTime<Utc>,
) -> Result<Note, ValidationError> {
    let mut issues = Issues::new();
    let mut next = existing.clone();
    if let Some(content) = patch.content {
        match issues.check(validate::non_empty("content", &content)) {
            Some(value) => next.content = value,
            None => return Err(issues.into_error(ENTITY)),
        }
    }
    next.updated_at = next_updated_at(existing.updated_at, now);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_content_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = NewNote {
            content: "\n\t ".into(),
        };
        let err = create_note(data, &|| "n".to_string(), now).unwrap_err();
        assert_eq!(err.entity, ENTITY);
        assert!(err.has_issue_for("content"));
    }
}
