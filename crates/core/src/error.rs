use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single field level diagnostic produced while validating input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Malformed or constraint violating input to an entity constructor or updater.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid {entity}: {}", join_issues(.issues))]
pub struct ValidationError {
    pub entity: &'static str,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Returns `true` when one of the issues refers to `field`.
    pub fn has_issue_for(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(FieldIssue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accumulates field issues so a constructor can report every bad field at once.
#[derive(Debug, Default)]
pub struct Issues {
    issues: Vec<FieldIssue>,
}

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            field,
            message: message.into(),
        });
    }

    /// Records the error of a validator result and yields the value on success.
    pub fn check<T>(&mut self, result: Result<T, FieldIssue>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(issue) => {
                self.issues.push(issue);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Converts the accumulated issues into a `ValidationError` for `entity`.
    pub fn into_error(self, entity: &'static str) -> ValidationError {
        ValidationError {
            entity,
            issues: self.issues,
        }
    }
}
