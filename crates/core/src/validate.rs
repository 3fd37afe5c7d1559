//! Reusable value checks shared by every entity constructor.
//!
//! Each validator returns the normalized value or a [`FieldIssue`] naming the
//! offending field, so callers can collect every problem through
//! [`crate::error::Issues`] before failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::clock::stamp;
use crate::error::FieldIssue;

fn issue(field: &'static str, message: impl Into<String>) -> FieldIssue {
    FieldIssue {
        field,
        message: message.into(),
    }
}

/// Trims `value` and rejects it when nothing is left.
pub fn non_empty(field: &'static str, value: &str) -> Result<String, FieldIssue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(issue(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trims optional free text, collapsing blank values to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|text| {
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

const LOCAL_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an RFC 3339 date-time, an offset-less local date-time, or a bare
/// `YYYY-MM-DD` date.
///
/// Offset-less values are read as UTC and bare dates resolve to UTC midnight.
/// The result is truncated to millisecond precision.
pub fn iso_datetime(field: &'static str, value: &str) -> Result<DateTime<Utc>, FieldIssue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(issue(field, "must not be empty"));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(stamp(parsed.with_timezone(&Utc)));
    }

    if let Some(local) = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    {
        return Ok(stamp(Utc.from_utc_datetime(&local)));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| issue(field, "must be an ISO 8601 date or date-time"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| issue(field, "must be an ISO 8601 date or date-time"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Minimal `local@domain.tld` shape check.
pub fn email(field: &'static str, value: &str) -> Result<String, FieldIssue> {
    let trimmed = value.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(issue(field, "must be an email address"));
    };
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !trimmed.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(issue(field, "must be an email address"));
    }
    Ok(trimmed.to_string())
}

/// Lowercases a domain and strips a leading `www.` and trailing dot.
pub fn normalize_domain(value: &str) -> String {
    let lowered = value.trim().to_ascii_lowercase();
    let without_www = lowered.strip_prefix("www.").unwrap_or(&lowered);
    without_www.trim_end_matches('.').to_string()
}

/// Normalizes a host name and rejects values that cannot be one.
pub fn domain(field: &'static str, value: &str) -> Result<String, FieldIssue> {
    let normalized = normalize_domain(value);
    if normalized.is_empty() {
        return Err(issue(field, "must not be empty"));
    }
    if !normalized.contains('.') || !normalized.split('.').all(is_domain_label) {
        return Err(issue(field, "must be a domain name such as example.com"));
    }
    Ok(normalized)
}

fn is_domain_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Interest ratings are limited to 1, 2 or 3.
pub fn interest_rating(field: &'static str, value: i64) -> Result<u8, FieldIssue> {
    match value {
        1..=3 => Ok(value as u8),
        _ => Err(issue(field, "must be 1, 2 or 3")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> DateTime<Utc> {
        iso_datetime("outreach_date", value).unwrap()
    }

    #[test]
    fn non_empty_trims_and_rejects_blank() {
        assert_eq!(non_empty("company", "  Acme ").unwrap(), "Acme");
        let err = non_empty("company", "   ").unwrap_err();
        assert_eq!(err.field, "company");
    }

    #[test]
    fn optional_text_collapses_blank() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" text ".into())), Some("text".into()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn bare_date_normalizes_to_utc_midnight() {
        assert_eq!(
            parse("2024-03-05").to_rfc3339(),
            "2024-03-05T00:00:00+00:00"
        );
    }

    #[test]
    fn datetime_with_offset_converts_to_utc_and_truncates() {
        let parsed = parse("2024-03-05T10:15:30.123456+02:00");
        assert_eq!(
            parsed.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "2024-03-05T08:15:30.123000Z"
        );
    }

    #[test]
    fn local_datetime_without_offset_reads_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(parse("2024-03-05T10:00:00"), expected);
        assert_eq!(parse("2024-03-05T10:00"), expected);

        let fractional = parse("2024-03-05T10:00:00.987654");
        assert_eq!(fractional.timestamp_subsec_nanos(), 987_000_000);
    }

    #[test]
    fn datetime_rejects_garbage() {
        assert!(iso_datetime("outreach_date", "next tuesday").is_err());
        assert!(iso_datetime("outreach_date", "2024-02-30").is_err());
        assert!(iso_datetime("outreach_date", "2024-03-05T25:00").is_err());
        assert!(iso_datetime("outreach_date", "").is_err());
    }

    #[test]
    fn email_shape() {
        assert!(email("contact_email", "jane@acme.io").is_ok());
        assert!(email("contact_email", "jane@acme").is_err());
        assert!(email("contact_email", "@acme.io").is_err());
        assert!(email("contact_email", "jane doe@acme.io").is_err());
    }

    #[test]
    fn domain_normalizes() {
        let normalized = domain("root_domain", " WWW.Greenhouse.IO. ").unwrap();
        assert_eq!(normalized, "greenhouse.io");
        assert!(domain("root_domain", "https://acme.io/jobs").is_err());
        assert!(domain("root_domain", "localhost").is_err());
    }

    #[test]
    fn interest_rating_bounds() {
        assert_eq!(interest_rating("interest_rating", 2).unwrap(), 2);
        assert!(interest_rating("interest_rating", 0).is_err());
        assert!(interest_rating("interest_rating", 4).is_err());
    }
}
