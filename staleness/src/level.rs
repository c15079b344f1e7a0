//! Escalation Level — the ladder a stale record climbs one run at a time
//!
//! ```text
//! UpToDate (0) ──▶ Notification (1) ──▶ FirstReminder (2)
//!                                            │
//!                  Deactivated (4) ◀── SecondReminder (3)
//! ```
//!
//! Each invocation moves a record exactly one rung. `Deactivated` is terminal:
//! the record is moved out of the active collection when it is reached.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of the last automated message sent to a record's owners.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    /// No message outstanding.
    #[default]
    UpToDate,
    /// First staleness notice.
    Notification,
    /// Sent one cooldown after the notification.
    FirstReminder,
    /// Last warning before deactivation.
    SecondReminder,
    /// Record archived. Terminal.
    Deactivated,
}

impl EscalationLevel {
    /// All levels in ladder order.
    pub const ALL: [EscalationLevel; 5] = [
        Self::UpToDate,
        Self::Notification,
        Self::FirstReminder,
        Self::SecondReminder,
        Self::Deactivated,
    ];

    /// Numeric value stored in the `last-message-level` metadata line.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::UpToDate => 0,
            Self::Notification => 1,
            Self::FirstReminder => 2,
            Self::SecondReminder => 3,
            Self::Deactivated => 4,
        }
    }

    /// Map a stored value back to a level. Unknown values yield `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::UpToDate),
            1 => Some(Self::Notification),
            2 => Some(Self::FirstReminder),
            3 => Some(Self::SecondReminder),
            4 => Some(Self::Deactivated),
            _ => None,
        }
    }

    /// The next rung, or `None` once deactivated.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::UpToDate => Some(Self::Notification),
            Self::Notification => Some(Self::FirstReminder),
            Self::FirstReminder => Some(Self::SecondReminder),
            Self::SecondReminder => Some(Self::Deactivated),
            Self::Deactivated => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deactivated)
    }

    /// Canonical label reported when this level is reached.
    pub fn action_label(self) -> &'static str {
        match self {
            Self::UpToDate => "No action needed",
            Self::Notification => "Sent notification",
            Self::FirstReminder => "Sent first reminder",
            Self::SecondReminder => "Sent second reminder",
            Self::Deactivated => "Deactivated",
        }
    }

    /// Key under which the message template for this level is stored.
    pub fn template_key(self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::Notification => "notification",
            Self::FirstReminder => "first-reminder",
            Self::SecondReminder => "second-reminder",
            Self::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up_to_date"),
            Self::Notification => write!(f, "notification"),
            Self::FirstReminder => write!(f, "first_reminder"),
            Self::SecondReminder => write!(f, "second_reminder"),
            Self::Deactivated => write!(f, "deactivated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_climbs_one_rung() {
        assert_eq!(
            EscalationLevel::UpToDate.next(),
            Some(EscalationLevel::Notification)
        );
        assert_eq!(
            EscalationLevel::Notification.next(),
            Some(EscalationLevel::FirstReminder)
        );
        assert_eq!(
            EscalationLevel::FirstReminder.next(),
            Some(EscalationLevel::SecondReminder)
        );
        assert_eq!(
            EscalationLevel::SecondReminder.next(),
            Some(EscalationLevel::Deactivated)
        );
        assert_eq!(EscalationLevel::Deactivated.next(), None);
    }

    #[test]
    fn test_next_is_numerically_plus_one() {
        for level in EscalationLevel::ALL {
            if let Some(next) = level.next() {
                assert_eq!(next.as_u8(), level.as_u8() + 1);
            }
        }
    }

    #[test]
    fn test_stored_value_round_trip() {
        for level in EscalationLevel::ALL {
            assert_eq!(EscalationLevel::from_u8(level.as_u8()), Some(level));
        }
        assert_eq!(EscalationLevel::from_u8(5), None);
    }

    #[test]
    fn test_only_deactivated_is_terminal() {
        let terminal: Vec<_> = EscalationLevel::ALL
            .into_iter()
            .filter(|l| l.is_terminal())
            .collect();
        assert_eq!(terminal, vec![EscalationLevel::Deactivated]);
    }

    #[test]
    fn test_template_keys_are_distinct() {
        let mut keys: Vec<_> = EscalationLevel::ALL
            .iter()
            .map(|l| l.template_key())
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), EscalationLevel::ALL.len());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&EscalationLevel::FirstReminder).unwrap();
        assert_eq!(json, "\"first_reminder\"");
    }
}
