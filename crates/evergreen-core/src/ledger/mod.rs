//! Session ledger: the observable collection of focus session records.
//!
//! The ledger is bound to one owner at a time and mirrors that owner's
//! records from the backing store. Every mutation re-reads the full set
//! and pushes it wholesale to subscribers; there are no incremental
//! diffs. Streaks and date filters are computed over local calendar
//! days, not UTC days.

mod session;

pub use session::{FocusSession, SessionOutcome};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{Local, NaiveDate};

use crate::error::{AuthError, Result};
use crate::store::SessionStore;

/// Streak walks stop after a year even on an unbroken run.
const STREAK_LOOKBACK_DAYS: usize = 365;

type Callback = Box<dyn Fn(&[FocusSession]) + Send + Sync>;

#[derive(Default)]
struct LedgerState {
    owner: Option<String>,
    sessions: Vec<FocusSession>,
    date_filter: Option<NaiveDate>,
}

/// Observable ledger of one owner's focus sessions.
///
/// Subscriber callbacks run synchronously on the mutating thread and
/// must not call back into the ledger.
pub struct SessionLedger {
    store: Arc<dyn SessionStore>,
    state: Mutex<LedgerState>,
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_sub_id: AtomicU64,
}

/// Handle returned by [`SessionLedger::subscribe`]. Dropping it (or
/// calling [`unsubscribe`](Self::unsubscribe)) removes the callback.
pub struct LedgerSubscription {
    id: u64,
    ledger: Weak<SessionLedger>,
}

impl LedgerSubscription {
    pub fn unsubscribe(self) {
        // Drop does the actual removal.
    }
}

impl Drop for LedgerSubscription {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.upgrade() {
            if let Ok(mut subs) = ledger.subscribers.lock() {
                subs.remove(&self.id);
            }
        }
    }
}

impl SessionLedger {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            state: Mutex::new(LedgerState::default()),
            subscribers: Mutex::new(HashMap::new()),
            next_sub_id: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Owner binding ────────────────────────────────────────────────

    /// Bind the ledger to an owner and load their records.
    pub fn bind(&self, owner_id: &str) -> Result<()> {
        let sessions = self.store.sessions_for_owner(owner_id)?;
        tracing::debug!(owner = owner_id, count = sessions.len(), "ledger bound");
        {
            let mut state = self.state();
            state.owner = Some(owner_id.to_string());
            state.sessions = sessions;
            state.date_filter = None;
        }
        self.notify();
        Ok(())
    }

    /// Detach from the current owner and clear the in-memory set.
    pub fn unbind(&self) {
        {
            let mut state = self.state();
            state.owner = None;
            state.sessions.clear();
            state.date_filter = None;
        }
        self.notify();
    }

    pub fn owner(&self) -> Option<String> {
        self.state().owner.clone()
    }

    fn require_owner(&self) -> Result<String> {
        self.state()
            .owner
            .clone()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Record a finished session for the bound owner.
    ///
    /// # Errors
    /// Returns [`AuthError::NotAuthenticated`] when no owner is bound;
    /// a session record is never silently dropped.
    pub fn append(&self, outcome: SessionOutcome, duration_min: u32) -> Result<FocusSession> {
        let owner = self.require_owner()?;
        let session = FocusSession::new(&owner, outcome, duration_min);
        self.store.insert_session(&session)?;
        self.refresh()?;
        Ok(session)
    }

    /// Remove a record by id. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let owner = self.require_owner()?;
        let existed = self.store.delete_session(&owner, id)?;
        self.refresh()?;
        Ok(existed)
    }

    /// Re-read the owner's records from the store and push the new set
    /// to subscribers.
    pub fn refresh(&self) -> Result<()> {
        let owner = self.require_owner()?;
        let sessions = self.store.sessions_for_owner(&owner)?;
        tracing::debug!(count = sessions.len(), "ledger refreshed");
        self.state().sessions = sessions;
        self.notify();
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current set, newest first.
    pub fn sessions(&self) -> Vec<FocusSession> {
        self.state().sessions.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state().sessions.is_empty()
    }

    /// Sessions recorded on the given local calendar day, any outcome.
    pub fn filter_by_date(&self, date: NaiveDate) -> Vec<FocusSession> {
        self.state()
            .sessions
            .iter()
            .filter(|s| s.local_day() == date)
            .cloned()
            .collect()
    }

    pub fn set_date_filter(&self, date: NaiveDate) {
        self.state().date_filter = Some(date);
    }

    pub fn clear_date_filter(&self) {
        self.state().date_filter = None;
    }

    pub fn date_filter(&self) -> Option<NaiveDate> {
        self.state().date_filter
    }

    /// The view the history screen renders: the full set, or one day of
    /// it while a date filter is active.
    pub fn filtered_sessions(&self) -> Vec<FocusSession> {
        let state = self.state();
        match state.date_filter {
            Some(date) => state
                .sessions
                .iter()
                .filter(|s| s.local_day() == date)
                .cloned()
                .collect(),
            None => state.sessions.clone(),
        }
    }

    /// Consecutive-day streak ending today (local time).
    ///
    /// Only `Completed` sessions count. The walk starts at today and
    /// stops at the first day without one, so a streak that ended
    /// yesterday reads as zero until today's session lands.
    pub fn streak_length(&self) -> u32 {
        self.streak_length_on(Local::now().date_naive())
    }

    /// Deterministic variant of [`streak_length`](Self::streak_length)
    /// anchored at an explicit day.
    pub fn streak_length_on(&self, today: NaiveDate) -> u32 {
        let days: HashSet<NaiveDate> = self
            .state()
            .sessions
            .iter()
            .filter(|s| s.outcome == SessionOutcome::Completed)
            .map(|s| s.local_day())
            .collect();

        let mut streak = 0u32;
        let mut cursor = today;
        for _ in 0..STREAK_LOOKBACK_DAYS {
            if !days.contains(&cursor) {
                break;
            }
            streak += 1;
            match cursor.pred_opt() {
                Some(prev) => cursor = prev,
                None => break,
            }
        }
        streak
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a callback receiving the full session set on every
    /// change. The current set is pushed immediately on subscribe.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> LedgerSubscription
    where
        F: Fn(&[FocusSession]) + Send + Sync + 'static,
    {
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        {
            let snapshot = self.sessions();
            callback(&snapshot);
        }
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.insert(id, Box::new(callback));
        }
        LedgerSubscription {
            id,
            ledger: Arc::downgrade(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn notify(&self) {
        let snapshot = self.sessions();
        if let Ok(subs) = self.subscribers.lock() {
            for callback in subs.values() {
                callback(&snapshot);
            }
        }
    }
}
