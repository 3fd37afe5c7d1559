use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{next_updated_at, stamp};
use crate::error::{FieldIssue, Issues, ValidationError};
use crate::validate;

pub const ENTITY: &str = "interview stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewType {
    PhoneScreen,
    Technical,
    Behavioral,
    SystemDesign,
    CaseStudy,
    TakeHome,
    Onsite,
    Other,
}

impl InterviewType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PhoneScreen => "phone_screen",
            Self::Technical => "technical",
            Self::Behavioral => "behavioral",
            Self::SystemDesign => "system_design",
            Self::CaseStudy => "case_study",
            Self::TakeHome => "take_home",
            Self::Onsite => "onsite",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "phone_screen" => Ok(Self::PhoneScreen),
            "technical" => Ok(Self::Technical),
            "behavioral" => Ok(Self::Behavioral),
            "system_design" => Ok(Self::SystemDesign),
            "case_study" => Ok(Self::CaseStudy),
            "take_home" => Ok(Self::TakeHome),
            "onsite" => Ok(Self::Onsite),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown interview type '{other}'")),
        }
    }
}

/// One round of the interview loop for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewStage {
    pub id: String,
    pub job_application_id: String,
    pub round: u32,
    pub interview_type: InterviewType,
    pub is_final_round: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInterviewStage {
    pub job_application_id: String,
    pub round: i64,
    pub interview_type: InterviewType,
    #[serde(default)]
    pub is_final_round: bool,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewStagePatch {
    #[serde(default)]
    pub round: Option<i64>,
    #[serde(default)]
    pub interview_type: Option<InterviewType>,
    #[serde(default)]
    pub is_final_round: Option<bool>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Replaces the whole question list.
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

fn round(value: i64) -> Result<u32, FieldIssue> {
    u32::try_from(value)
        .ok()
        .filter(|round| *round >= 1)
        .ok_or_else(|| FieldIssue {
            field: "round",
            message: format!("must be between 1 and {}", u32::MAX),
        })
}

fn questions(issues: &mut Issues, values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|question| issues.check(validate::non_empty("questions", &question)))
        .collect()
}

pub fn create_interview_stage(
    data: NewInterviewStage,
    ids: &dyn Fn() -> String,
    now: DateTime<Utc>,
) -> Result<InterviewStage, ValidationError> {
    let mut issues = Issues::new();
    let job_application_id = issues.check(validate::non_empty(
        "job_application_id",
        &data.job_application_id,
    ));
    let round = issues.check(round(data.round));
    let scheduled_date = validate::optional_text(data.scheduled_date)
        .and_then(|date| issues.check(validate::iso_datetime("scheduled_date", &date)));
    let questions = questions(&mut issues, data.questions);

    match (job_application_id, round) {
        (Some(job_application_id), Some(round)) if issues.is_empty() => {
            let now = stamp(now);
            Ok(InterviewStage {
                id: ids(),
                job_application_id,
                round,
                interview_type: data.interview_type,
                is_final_round: data.is_final_round,
                scheduled_date,
                notes: validate::optional_text(data.notes),
                questions,
                created_at: now,
                updated_at: now,
            })
        }
        _ => Err(issues.into_error(ENTITY)),
    }
}

pub fn update_interview_stage(
    existing: &InterviewStage,
    patch: InterviewStagePatch,
    now: DateTime<Utc>,
) -> Result<InterviewStage, ValidationError> {
    let mut issues = Issues::new();
    let mut next = existing.clone();

    if let Some(value) = patch.round {
        if let Some(value) = issues.check(round(value)) {
            next.round = value;
        }
    }
    if let Some(interview_type) = patch.interview_type {
        next.interview_type = interview_type;
    }
    if let Some(is_final_round) = patch.is_final_round {
        next.is_final_round = is_final_round;
    }
    if let Some(date) = patch.scheduled_date {
        if let Some(value) = issues.check(validate::iso_datetime("scheduled_date", &date)) {
            next.scheduled_date = Some(value);
        }
    }
    if let Some(notes) = patch.notes {
        next.notes = validate::optional_text(Some(notes));
    }
    if let Some(values) = patch.questions {
        next.questions = questions(&mut issues, values);
    }

    if !issues.is_empty() {
        return Err(issues.into_error(ENTITY));
    }
    next.updated_at = next_updated_at(existing.updated_at, now);
    Ok(next)
}

/// Earliest round first.
pub fn by_round_asc(a: &InterviewStage, b: &InterviewStage) -> Ordering {
    a.round.cmp(&b.round).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn create(data: NewInterviewStage) -> Result<InterviewStage, ValidationError> {
        create_interview_stage(data, &|| "stage-1".to_string(), now())
    }

    fn payload(round: i64) -> NewInterviewStage {
        NewInterviewStage {
            job_application_id: "00000000-0000-4000-8000-000000000001".into(),
            round,
            interview_type: InterviewType::Technical,
            is_final_round: false,
            scheduled_date: Some("2024-06-10T15:00:00Z".into()),
            notes: None,
            questions: vec!["Design a rate limiter".into()],
        }
    }

    #[test]
    fn create_accepts_first_round() {
        let stage = create(payload(1)).unwrap();
        assert_eq!(stage.id, "stage-1");
        assert_eq!(stage.round, 1);
        assert_eq!(stage.questions, vec!["Design a rate limiter".to_string()]);
        assert_eq!(stage.created_at, stage.updated_at);
    }

    #[test]
    fn create_rejects_non_positive_round() {
        for value in [0, -3] {
            let err = create(payload(value)).unwrap_err();
            assert!(err.has_issue_for("round"));
        }
    }

    #[test]
    fn oversized_round_reports_the_allowed_range() {
        let err = create(payload(5_000_000_000)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid interview stage: round: must be between 1 and 4294967295"
        );
    }

    #[test]
    fn blank_questions_are_rejected() {
        let mut data = payload(2);
        data.questions.push("  ".into());
        let err = create(data).unwrap_err();
        assert!(err.has_issue_for("questions"));
    }

    #[test]
    fn update_replaces_questions_and_validates_round() {
        let stage = create(payload(1)).unwrap();
        let patch = InterviewStagePatch {
            questions: Some(vec!["Tell me about yourself".into(), "Why us?".into()]),
            is_final_round: Some(true),
            ..InterviewStagePatch::default()
        };
        let updated = update_interview_stage(&stage, patch, now()).unwrap();
        assert_eq!(updated.questions.len(), 2);
        assert!(updated.is_final_round);
        assert!(updated.updated_at > stage.updated_at);

        let bad = InterviewStagePatch {
            round: Some(0),
            ..InterviewStagePatch::default()
        };
        assert!(update_interview_stage(&stage, bad, now()).is_err());
    }

    #[test]
    fn sorts_by_round_ascending() {
        let mut stages: Vec<_> = [3, 1, 2]
            .into_iter()
            .map(|round| create(payload(round)).unwrap())
            .collect();
        stages.sort_by(by_round_asc);
        let rounds: Vec<u32> = stages.iter().map(|stage| stage.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
    }
}
