//! Focus session records.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a focus session ended.
///
/// Serialized as `Completed` / `Failed`, matching the hosted document
/// store's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionOutcome {
    Completed,
    Failed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "Completed",
            SessionOutcome::Failed => "Failed",
        }
    }

    /// Parse the wire/storage representation. Unknown strings are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Completed" => Some(SessionOutcome::Completed),
            "Failed" => Some(SessionOutcome::Failed),
            _ => None,
        }
    }
}

/// One recorded focus session.
///
/// `duration_min` is the planned length in minutes; `time_planted_secs`
/// is always `duration_min * 60` and exists because the hosted store
/// carries it as a separate field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: String,
    pub owner_id: String,
    pub outcome: SessionOutcome,
    pub duration_min: u32,
    pub recorded_at: DateTime<Utc>,
    pub time_planted_secs: u64,
}

impl FocusSession {
    /// Build a new record stamped with the current time.
    pub fn new(owner_id: &str, outcome: SessionOutcome, duration_min: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            outcome,
            duration_min,
            recorded_at: Utc::now(),
            time_planted_secs: u64::from(duration_min) * 60,
        }
    }

    /// Calendar day of this session in the user's local timezone.
    /// Streaks and date filters operate on local days, not UTC days.
    pub fn local_day(&self) -> NaiveDate {
        self.recorded_at.with_timezone(&Local).date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_session_derives_planted_seconds() {
        let s = FocusSession::new("user-1", SessionOutcome::Completed, 25);
        assert_eq!(s.time_planted_secs, 25 * 60);
        assert_eq!(s.outcome, SessionOutcome::Completed);
        assert!(!s.id.is_empty());
    }

    #[test]
    fn outcome_round_trips_wire_spelling() {
        assert_eq!(SessionOutcome::Completed.as_str(), "Completed");
        assert_eq!(SessionOutcome::Failed.as_str(), "Failed");
        assert_eq!(
            SessionOutcome::parse("Completed"),
            Some(SessionOutcome::Completed)
        );
        assert_eq!(SessionOutcome::parse("failed"), None);
        assert_eq!(SessionOutcome::parse(""), None);
    }

    #[test]
    fn outcome_serde_uses_capitalized_variants() {
        let json = serde_json::to_string(&SessionOutcome::Failed).unwrap();
        assert_eq!(json, "\"Failed\"");
        let back: SessionOutcome = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(back, SessionOutcome::Completed);
    }

    #[test]
    fn local_day_uses_local_timezone() {
        let noon_local = Local.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let s = FocusSession {
            id: "s1".into(),
            owner_id: "user-1".into(),
            outcome: SessionOutcome::Completed,
            duration_min: 25,
            recorded_at: noon_local.with_timezone(&Utc),
            time_planted_secs: 1500,
        };
        assert_eq!(s.local_day(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }
}
