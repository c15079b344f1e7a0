//! Staleness Policy — which records are due for a message this run
//!
//! A record is eligible when both hold:
//! - its owner has not updated it within the staleness window (365 days), and
//! - no automated message went out within the cooldown window (28 days).
//!
//! The cooldown is what spaces successive escalation emails at least 28 days
//! apart.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Thresholds for eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessPolicy {
    /// Days without an owner update before a record counts as stale
    pub staleness_days: i64,
    /// Minimum days between two automated messages to the same record
    pub cooldown_days: i64,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            staleness_days: 365,
            cooldown_days: 28,
        }
    }
}

impl StalenessPolicy {
    pub fn staleness_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        days_before(now, self.staleness_days)
    }

    pub fn cooldown_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        days_before(now, self.cooldown_days)
    }

    /// Whether `record` is due for its next message at `now`.
    pub fn is_eligible(&self, record: &Record, now: DateTime<Utc>) -> bool {
        record.last_update_time < self.staleness_cutoff(now)
            && record.last_message_time < self.cooldown_cutoff(now)
    }

    /// Keep only eligible records, preserving order.
    pub fn filter_eligible(&self, records: Vec<Record>, now: DateTime<Utc>) -> Vec<Record> {
        records
            .into_iter()
            .filter(|r| self.is_eligible(r, now))
            .collect()
    }
}

/// `now - days`, saturating at the earliest representable instant so an
/// oversized window makes nothing eligible instead of overflowing.
fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::EscalationLevel;
    use crate::record::test_support::record_aged;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn test_stale_and_never_messaged_is_eligible() {
        let policy = StalenessPolicy::default();
        let mut record = record_aged("a", now(), 400, 0, EscalationLevel::UpToDate);
        record.last_message_time = DateTime::<Utc>::UNIX_EPOCH;
        assert!(policy.is_eligible(&record, now()));
    }

    #[test]
    fn test_recent_update_excluded_regardless_of_level() {
        let policy = StalenessPolicy::default();
        for level in EscalationLevel::ALL {
            let record = record_aged("a", now(), 10, 400, level);
            assert!(!policy.is_eligible(&record, now()), "level {level}");
        }
    }

    #[test]
    fn test_recent_message_excluded_even_if_very_stale() {
        let policy = StalenessPolicy::default();
        let record = record_aged("a", now(), 500, 5, EscalationLevel::Notification);
        assert!(!policy.is_eligible(&record, now()));
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let policy = StalenessPolicy::default();
        let at_staleness = record_aged("a", now(), 365, 400, EscalationLevel::UpToDate);
        assert!(!policy.is_eligible(&at_staleness, now()));

        let at_cooldown = record_aged("b", now(), 400, 28, EscalationLevel::Notification);
        assert!(!policy.is_eligible(&at_cooldown, now()));

        let past_both = record_aged("c", now(), 366, 29, EscalationLevel::Notification);
        assert!(policy.is_eligible(&past_both, now()));
    }

    #[test]
    fn test_filter_keeps_order() {
        let policy = StalenessPolicy::default();
        let records = vec![
            record_aged("a", now(), 400, 100, EscalationLevel::UpToDate),
            record_aged("b", now(), 10, 100, EscalationLevel::UpToDate),
            record_aged("c", now(), 400, 100, EscalationLevel::FirstReminder),
        ];
        let ids: Vec<_> = policy
            .filter_eligible(records, now())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_oversized_windows_saturate_instead_of_panicking() {
        let policy = StalenessPolicy {
            staleness_days: 100_000_000,
            cooldown_days: i64::MAX,
        };
        assert_eq!(policy.staleness_cutoff(now()), DateTime::<Utc>::MIN_UTC);
        assert_eq!(policy.cooldown_cutoff(now()), DateTime::<Utc>::MIN_UTC);

        let ancient = record_aged("a", now(), 400, 400, EscalationLevel::UpToDate);
        assert!(!policy.is_eligible(&ancient, now()));
    }
}
