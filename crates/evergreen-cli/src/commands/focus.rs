//! Focus timer commands.
//!
//! The timer machine is persisted in the store's kv table between
//! invocations. Each command first delivers the ticks that elapsed
//! since the previous invocation, one at a time, so a run started
//! earlier completes (and is recorded) the next time any focus
//! command touches it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use evergreen_core::sync::{LedgerOp, SyncQueue};
use evergreen_core::{
    AdSessionManager, Event, FocusController, FocusTimerMachine, SessionLedger, SessionOutcome,
    SqliteStore, TimerPhase, UserProfile,
};

const MACHINE_KEY: &str = "focus.machine";
const LAST_TICK_KEY: &str = "focus.last_tick_at";

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a focus session
    Start {
        /// Session length in minutes
        minutes: u32,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Abandon the running session and record it as failed
    GiveUp {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print the current timer state as JSON
    Status,
    /// Drop the timer state without recording anything
    Reset,
    /// Run a session in the foreground, printing events until it ends
    Run {
        /// Session length in minutes
        minutes: u32,
    },
}

fn load_machine(store: &SqliteStore) -> FocusTimerMachine {
    if let Ok(Some(json)) = store.kv_get(MACHINE_KEY) {
        if let Ok(machine) = serde_json::from_str::<FocusTimerMachine>(&json) {
            return machine;
        }
    }
    FocusTimerMachine::new()
}

fn save_machine(
    store: &SqliteStore,
    machine: &FocusTimerMachine,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(machine)?;
    store.kv_set(MACHINE_KEY, &json)?;
    Ok(())
}

/// Deliver the ticks owed since the previous invocation, one per
/// elapsed second. Returns the completion event if the run finished.
fn catch_up(
    store: &SqliteStore,
    machine: &mut FocusTimerMachine,
) -> Result<Option<Event>, Box<dyn std::error::Error>> {
    if machine.phase() != TimerPhase::Focusing {
        return Ok(None);
    }
    let Some(raw) = store.kv_get(LAST_TICK_KEY)? else {
        store.kv_set(LAST_TICK_KEY, &Utc::now().to_rfc3339())?;
        return Ok(None);
    };
    let last_tick = DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let elapsed = (Utc::now() - last_tick).num_seconds().max(0);

    let mut completed = None;
    let mut delivered = 0i64;
    for _ in 0..elapsed {
        if machine.phase() != TimerPhase::Focusing {
            break;
        }
        delivered += 1;
        if let Some(event) = machine.tick() {
            completed = Some(event);
            break;
        }
    }
    store.kv_set(
        LAST_TICK_KEY,
        &(last_tick + Duration::seconds(delivered)).to_rfc3339(),
    )?;
    Ok(completed)
}

/// Append the finished run to the ledger and queue it for upload.
fn record_outcome(
    store: &Arc<SqliteStore>,
    profile: Option<&UserProfile>,
    outcome: SessionOutcome,
    duration_min: u32,
) -> Result<Event, Box<dyn std::error::Error>> {
    let profile = profile.ok_or(super::NOT_SIGNED_IN)?;
    let ledger = super::bound_ledger(store, profile)?;
    let session = ledger.append(outcome, duration_min)?;

    let mut queue = SyncQueue::new();
    let _ = queue.load();
    queue.enqueue(LedgerOp::Upsert {
        session: session.clone(),
    });
    queue.persist()?;

    Ok(Event::SessionRecorded {
        session_id: session.id,
        outcome,
        duration_min,
        at: session.recorded_at,
    })
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _auth, profile) = super::open_session()?;
    let mut machine = load_machine(&store);

    // A run that finished while no process was alive is recorded before
    // the requested action executes.
    if let Some(event) = catch_up(&store, &mut machine)? {
        println!("{}", serde_json::to_string_pretty(&event)?);
        if let Event::FocusCompleted { duration_min, .. } = event {
            let recorded = record_outcome(
                &store,
                profile.as_ref(),
                SessionOutcome::Completed,
                duration_min,
            )?;
            println!("{}", serde_json::to_string_pretty(&recorded)?);
        }
        machine.reset();
        store.kv_delete(LAST_TICK_KEY)?;
    }

    match action {
        FocusAction::Start { minutes } => {
            if profile.is_none() {
                return Err(super::NOT_SIGNED_IN.into());
            }
            match machine.start(minutes)? {
                Some(event) => {
                    store.kv_set(LAST_TICK_KEY, &Utc::now().to_rfc3339())?;
                    println!("{}", serde_json::to_string_pretty(&event)?);
                }
                None => return Err("a focus session is already in progress".into()),
            }
        }
        FocusAction::Pause => {
            if let Some(event) = machine.pause() {
                store.kv_delete(LAST_TICK_KEY)?;
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
            }
        }
        FocusAction::Resume => {
            if let Some(event) = machine.resume() {
                store.kv_set(LAST_TICK_KEY, &Utc::now().to_rfc3339())?;
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
            }
        }
        FocusAction::GiveUp { yes } => {
            let Some(event) = machine.request_give_up() else {
                return Err("no focus session to give up".into());
            };
            println!("{}", serde_json::to_string_pretty(&event)?);

            if yes || super::confirm("Give up this session?")? {
                if let Some(abandoned) = machine.confirm_give_up() {
                    println!("{}", serde_json::to_string_pretty(&abandoned)?);
                    if let Event::FocusAbandoned { duration_min, .. } = abandoned {
                        let recorded = record_outcome(
                            &store,
                            profile.as_ref(),
                            SessionOutcome::Failed,
                            duration_min,
                        )?;
                        println!("{}", serde_json::to_string_pretty(&recorded)?);
                    }
                    machine.reset();
                    store.kv_delete(LAST_TICK_KEY)?;
                }
            } else if let Some(event) = machine.cancel_give_up() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
        }
        FocusAction::Status => {
            println!("{}", serde_json::to_string_pretty(&machine.snapshot())?);
        }
        FocusAction::Reset => {
            if let Some(event) = machine.reset() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
            store.kv_delete(LAST_TICK_KEY)?;
        }
        FocusAction::Run { minutes } => {
            let profile = profile.as_ref().ok_or(super::NOT_SIGNED_IN)?;
            if machine.phase() != TimerPhase::Idle {
                return Err("a focus session is already in progress".into());
            }
            let ledger = super::bound_ledger(&store, profile)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_foreground(Arc::clone(&ledger), minutes))?;

            // Mirror the recorded session onto the upload queue
            if let Some(session) = ledger.sessions().into_iter().next() {
                let mut queue = SyncQueue::new();
                let _ = queue.load();
                queue.enqueue(LedgerOp::Upsert { session });
                queue.persist()?;
            }
        }
    }

    save_machine(&store, &machine)?;
    Ok(())
}

/// Drive a live session with a real tick source, printing every event.
async fn run_foreground(
    ledger: Arc<SessionLedger>,
    minutes: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = FocusController::new(ledger, Arc::new(AdSessionManager::disabled()));
    let event = controller.start(minutes)?;
    println!("{}", serde_json::to_string_pretty(&event)?);

    while let Some(event) = controller.next_event().await {
        let done = matches!(event, Event::SessionRecorded { .. });
        println!("{}", serde_json::to_string_pretty(&event)?);
        if done {
            break;
        }
    }
    controller.acknowledge();
    Ok(())
}
