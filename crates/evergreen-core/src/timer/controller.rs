//! Session orchestration.
//!
//! `FocusController` wires the pure state machine to its collaborators:
//! the tick source that drives it, the ledger that records outcomes, and
//! the ad manager. Every terminal state produces exactly one ledger
//! append; completion appends happen on the tick task, give-up appends on
//! the confirming caller.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::machine::{FocusTimerMachine, TimerPhase};
use super::ticker::TickSource;
use crate::ads::{AdPlacement, AdSessionManager};
use crate::error::{AuthError, CoreError, Result};
use crate::events::Event;
use crate::ledger::{SessionLedger, SessionOutcome};

/// Drives one focus timer against a bound ledger.
///
/// All collaborators are injected at construction; the controller has no
/// ambient dependencies.
pub struct FocusController {
    machine: Arc<Mutex<FocusTimerMachine>>,
    ledger: Arc<SessionLedger>,
    ads: Arc<AdSessionManager>,
    ticker: TickSource,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

fn lock_machine(machine: &Mutex<FocusTimerMachine>) -> MutexGuard<'_, FocusTimerMachine> {
    machine.lock().unwrap_or_else(|e| e.into_inner())
}

impl FocusController {
    pub fn new(ledger: Arc<SessionLedger>, ads: Arc<AdSessionManager>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            machine: Arc::new(Mutex::new(FocusTimerMachine::new())),
            ledger,
            ads,
            ticker: TickSource::new(),
            events_tx,
            events_rx,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        lock_machine(&self.machine).phase()
    }

    pub fn snapshot(&self) -> Event {
        lock_machine(&self.machine).snapshot()
    }

    pub fn ledger(&self) -> &Arc<SessionLedger> {
        &self.ledger
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a focus session and begin ticking.
    ///
    /// # Errors
    /// Rejects a zero duration, an unbound ledger, and a machine that is
    /// not idle. Sessions recorded later must have an owner, so the auth
    /// check happens up front rather than at completion time.
    pub fn start(&mut self, duration_min: u32) -> Result<Event> {
        if self.ledger.owner().is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        let started = lock_machine(&self.machine).start(duration_min)?;
        let event = started.ok_or_else(|| {
            CoreError::Custom("a focus session is already in progress".to_string())
        })?;
        self.ads.load(AdPlacement::Interstitial);
        self.spawn_ticks();
        Ok(event)
    }

    /// Pause the countdown. Ticking stops entirely while paused.
    pub fn pause(&mut self) -> Option<Event> {
        let event = lock_machine(&self.machine).pause();
        if event.is_some() {
            self.ticker.disarm();
        }
        event
    }

    /// Resume a paused session and restart ticking.
    pub fn resume(&mut self) -> Option<Event> {
        let event = lock_machine(&self.machine).resume();
        if event.is_some() {
            self.spawn_ticks();
        }
        event
    }

    pub fn request_give_up(&mut self) -> Option<Event> {
        lock_machine(&self.machine).request_give_up()
    }

    pub fn cancel_give_up(&mut self) -> Option<Event> {
        lock_machine(&self.machine).cancel_give_up()
    }

    /// Confirm a pending give-up: the session is recorded as failed and
    /// the machine returns to idle.
    ///
    /// # Errors
    /// Propagates ledger failures; the failed session is never dropped.
    pub fn confirm_give_up(&mut self) -> Result<Option<Event>> {
        let event = lock_machine(&self.machine).confirm_give_up();
        let Some(event) = event else {
            return Ok(None);
        };
        self.ticker.disarm();
        if let Event::FocusAbandoned { duration_min, .. } = event {
            let session = self.ledger.append(SessionOutcome::Failed, duration_min)?;
            let _ = self.events_tx.send(Event::SessionRecorded {
                session_id: session.id,
                outcome: SessionOutcome::Failed,
                duration_min,
                at: session.recorded_at,
            });
            self.ads.show(AdPlacement::Interstitial);
        }
        lock_machine(&self.machine).reset();
        Ok(Some(event))
    }

    /// Leave a terminal state and return to idle.
    pub fn acknowledge(&mut self) -> Option<Event> {
        let mut machine = lock_machine(&self.machine);
        if !machine.phase().is_terminal() {
            return None;
        }
        machine.reset()
    }

    /// Abandon whatever is in flight and return to idle without
    /// recording anything.
    pub fn reset(&mut self) -> Option<Event> {
        self.ticker.disarm();
        lock_machine(&self.machine).reset()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Non-blocking drain of events produced by the tick task.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Await the next tick-task event.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events_rx.recv().await
    }

    fn spawn_ticks(&mut self) {
        let machine = Arc::clone(&self.machine);
        let ledger = Arc::clone(&self.ledger);
        let ads = Arc::clone(&self.ads);
        let events_tx = self.events_tx.clone();
        self.ticker.arm(move || {
            let event = lock_machine(&machine).tick();
            match event {
                Some(Event::FocusCompleted { duration_min, at }) => {
                    let _ = events_tx.send(Event::FocusCompleted { duration_min, at });
                    match ledger.append(SessionOutcome::Completed, duration_min) {
                        Ok(session) => {
                            let _ = events_tx.send(Event::SessionRecorded {
                                session_id: session.id,
                                outcome: SessionOutcome::Completed,
                                duration_min,
                                at: session.recorded_at,
                            });
                        }
                        Err(e) => {
                            tracing::error!("failed to record completed session: {e}");
                        }
                    }
                    ads.show(AdPlacement::Interstitial);
                    false
                }
                Some(other) => {
                    let _ = events_tx.send(other);
                    true
                }
                None => true,
            }
        });
    }
}
