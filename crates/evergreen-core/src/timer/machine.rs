//! Focus timer state machine.
//!
//! The machine is count-based: it does not read the clock, and every
//! `tick()` call subtracts exactly one second. The caller owns the tick
//! cadence (see [`TickSource`](super::TickSource)); a delayed tick is
//! delivered once, never batched into a catch-up burst.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Focusing <-> Paused
//!         Focusing -> Celebrating (countdown reached zero)
//!         Focusing | Paused -> Failed (give-up confirmed)
//!         Celebrating | Failed -> Idle (reset)
//! ```
//!
//! Giving up is a two-step gate: `request_give_up()` opens a
//! confirmation window, and only `confirm_give_up()` ends the session.
//! The countdown keeps running while confirmation is pending.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Focusing,
    Paused,
    /// Terminal: the countdown finished.
    Celebrating,
    /// Terminal: the user gave up.
    Failed,
}

impl TimerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerPhase::Celebrating | TimerPhase::Failed)
    }
}

/// Core focus timer state machine.
///
/// Serializable so front-ends can persist it between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusTimerMachine {
    phase: TimerPhase,
    /// Planned session length in minutes; zero while idle.
    duration_min: u32,
    remaining_secs: u64,
    /// Give-up confirmation window is open.
    #[serde(default)]
    give_up_pending: bool,
}

impl Default for FocusTimerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTimerMachine {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            duration_min: 0,
            remaining_secs: 0,
            give_up_pending: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn duration_min(&self) -> u32 {
        self.duration_min
    }

    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_min) * 60
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_give_up_pending(&self) -> bool {
        self.give_up_pending
    }

    /// 0.0 .. 1.0 progress through the planned duration.
    pub fn progress(&self) -> f64 {
        let total = self.duration_secs();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_secs as f64 / total as f64)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            duration_secs: self.duration_secs(),
            progress: self.progress(),
            give_up_pending: self.give_up_pending,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a focus session of `duration_min` minutes.
    ///
    /// # Errors
    /// A zero duration is rejected outright, never clamped to a minimum.
    /// Returns `Ok(None)` when the machine is not idle.
    pub fn start(&mut self, duration_min: u32) -> Result<Option<Event>, ValidationError> {
        if duration_min == 0 {
            return Err(ValidationError::ZeroDuration);
        }
        if self.phase != TimerPhase::Idle {
            return Ok(None);
        }
        self.phase = TimerPhase::Focusing;
        self.duration_min = duration_min;
        self.remaining_secs = u64::from(duration_min) * 60;
        self.give_up_pending = false;
        Ok(Some(Event::FocusStarted {
            duration_min,
            duration_secs: self.remaining_secs,
            at: Utc::now(),
        }))
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.phase {
            TimerPhase::Focusing => {
                self.phase = TimerPhase::Paused;
                Some(Event::FocusPaused {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match self.phase {
            TimerPhase::Paused => {
                self.phase = TimerPhase::Focusing;
                Some(Event::FocusResumed {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Deliver one elapsed second. Returns `Some(Event::FocusCompleted)`
    /// exactly once, on the tick that reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if self.phase != TimerPhase::Focusing {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.phase = TimerPhase::Celebrating;
            self.give_up_pending = false;
            return Some(Event::FocusCompleted {
                duration_min: self.duration_min,
                at: Utc::now(),
            });
        }
        None
    }

    /// Open the give-up confirmation window.
    pub fn request_give_up(&mut self) -> Option<Event> {
        match self.phase {
            TimerPhase::Focusing | TimerPhase::Paused if !self.give_up_pending => {
                self.give_up_pending = true;
                Some(Event::GiveUpRequested {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Close the confirmation window without ending the session.
    pub fn cancel_give_up(&mut self) -> Option<Event> {
        if !self.give_up_pending {
            return None;
        }
        self.give_up_pending = false;
        Some(Event::GiveUpCancelled { at: Utc::now() })
    }

    /// End the session as failed. Only effective while the confirmation
    /// window opened by [`request_give_up`](Self::request_give_up) is
    /// still pending; an unrequested confirm is ignored.
    pub fn confirm_give_up(&mut self) -> Option<Event> {
        if !self.give_up_pending {
            return None;
        }
        match self.phase {
            TimerPhase::Focusing | TimerPhase::Paused => {
                self.phase = TimerPhase::Failed;
                self.give_up_pending = false;
                Some(Event::FocusAbandoned {
                    duration_min: self.duration_min,
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => {
                self.give_up_pending = false;
                None
            }
        }
    }

    /// Return to idle from any state.
    pub fn reset(&mut self) -> Option<Event> {
        self.phase = TimerPhase::Idle;
        self.duration_min = 0;
        self.remaining_secs = 0;
        self.give_up_pending = false;
        Some(Event::TimerReset { at: Utc::now() })
    }
}
