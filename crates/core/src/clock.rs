use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

/// Source of the current instant, injected wherever entities are stamped.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Zero-argument generator of unique entity identifiers.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Clock frozen at `at`, used by tests.
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// Default identifier strategy: random v4 UUIDs.
pub fn uuid_generator() -> IdGenerator {
    Arc::new(|| Uuid::new_v4().to_string())
}

/// Deterministic UUID-shaped identifiers (`...-000000000001`, `...-000000000002`, ...).
pub fn sequential_ids() -> IdGenerator {
    let counter = AtomicU64::new(0);
    Arc::new(move || {
        let next = counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("00000000-0000-4000-8000-{next:012x}")
    })
}

/// Truncates an instant to the millisecond precision entities are stored with.
pub fn stamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Returns the `updated_at` for a mutation happening at `now`.
///
/// The value is strictly later than `previous`, even if the clock has not moved.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = stamp(now);
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sequential_ids_are_uuid_shaped_and_increasing() {
        let ids = sequential_ids();
        assert_eq!(ids(), "00000000-0000-4000-8000-000000000001");
        assert_eq!(ids(), "00000000-0000-4000-8000-000000000002");
        assert!(Uuid::parse_str(&ids()).is_ok());
    }

    #[test]
    fn next_updated_at_always_advances() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(next_updated_at(at, at), at + Duration::milliseconds(1));
        assert_eq!(
            next_updated_at(at, at - Duration::seconds(5)),
            at + Duration::milliseconds(1)
        );
        let later = at + Duration::seconds(10);
        assert_eq!(next_updated_at(at, later), later);
    }
}
