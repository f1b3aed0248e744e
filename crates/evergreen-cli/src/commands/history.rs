//! Session history commands.

use chrono::NaiveDate;
use clap::Subcommand;
use evergreen_core::sync::{LedgerOp, SyncQueue};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded sessions, newest first
    List {
        /// Only sessions on this local day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Length of the current run of days with a completed session
    Streak,
    /// Remove one session record
    Remove {
        /// Session id to remove
        id: String,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _auth, profile) = super::open_session()?;
    let profile = profile.ok_or(super::NOT_SIGNED_IN)?;
    let ledger = super::bound_ledger(&store, &profile)?;

    match action {
        HistoryAction::List { date, json } => {
            let sessions = match date {
                Some(day) => ledger.filter_by_date(day),
                None => ledger.sessions(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("No sessions recorded.");
            } else {
                for s in &sessions {
                    println!(
                        "{}  {:9}  {:>4}m  {}",
                        s.recorded_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M"),
                        s.outcome.as_str(),
                        s.duration_min,
                        s.id
                    );
                }
            }
        }
        HistoryAction::Streak => {
            println!("{}", ledger.streak_length());
        }
        HistoryAction::Remove { id } => {
            if !ledger.remove(&id)? {
                return Err(format!("no session with id {id}").into());
            }
            let mut queue = SyncQueue::new();
            let _ = queue.load();
            queue.enqueue(LedgerOp::Delete {
                id,
                owner_id: profile.id.clone(),
            });
            queue.persist()?;
            println!("Removed.");
        }
    }
    Ok(())
}
