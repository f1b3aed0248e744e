use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::SessionOutcome;
use crate::timer::TimerPhase;

/// Every state change in the system produces an Event.
/// The CLI prints them; front-ends subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    FocusStarted {
        duration_min: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    FocusPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    FocusResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero; the session counts as completed.
    FocusCompleted {
        duration_min: u32,
        at: DateTime<Utc>,
    },
    /// User asked to give up; waiting for confirmation.
    GiveUpRequested {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// User backed out of the give-up confirmation.
    GiveUpCancelled {
        at: DateTime<Utc>,
    },
    /// Give-up confirmed; the session counts as failed.
    FocusAbandoned {
        duration_min: u32,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// A session record was written to the ledger.
    SessionRecorded {
        session_id: String,
        outcome: SessionOutcome,
        duration_min: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: TimerPhase,
        remaining_secs: u64,
        duration_secs: u64,
        progress: f64,
        give_up_pending: bool,
        at: DateTime<Utc>,
    },
}
