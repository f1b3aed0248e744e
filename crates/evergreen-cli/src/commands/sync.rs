//! Remote mirror commands.
//!
//! Queued local changes are debounced for a few seconds so rapid edits
//! coalesce; `push` waits the window out instead of skipping ops.

use clap::Subcommand;
use evergreen_core::sync::{self, SyncStatus};
use evergreen_core::{RemoteLedgerClient, SyncQueue};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show the pending upload queue
    Status,
    /// Upload queued local changes to the remote mirror
    Push {
        /// Remote base URL, e.g. https://api.example.com/v1
        #[arg(long)]
        base_url: String,
        /// Bearer token for the remote
        #[arg(long)]
        token: Option<String>,
    },
    /// Download the remote session set into the local store
    Pull {
        /// Remote base URL
        #[arg(long)]
        base_url: String,
        /// Bearer token for the remote
        #[arg(long)]
        token: Option<String>,
    },
}

pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Status => {
            let mut queue = SyncQueue::new();
            queue.load()?;
            println!("{}", serde_json::to_string_pretty(&SyncStatus::of(&queue))?);
        }
        SyncAction::Push { base_url, token } => {
            let (_store, _auth, profile) = super::open_session()?;
            if profile.is_none() {
                return Err(super::NOT_SIGNED_IN.into());
            }
            let mut queue = SyncQueue::new();
            queue.load()?;
            if queue.is_empty() {
                println!("Nothing to push.");
                return Ok(());
            }
            let client = build_client(&base_url, token)?;

            // Wait out the debounce window so every queued op drains
            if let Some(wait) = queue.time_until_next_batch() {
                std::thread::sleep(wait.to_std().unwrap_or_default());
            }
            let runtime = tokio::runtime::Runtime::new()?;
            let pushed = runtime.block_on(sync::flush(&mut queue, &client));
            queue.persist()?;
            println!("Pushed {} change(s).", pushed?);
        }
        SyncAction::Pull { base_url, token } => {
            let (store, _auth, profile) = super::open_session()?;
            let profile = profile.ok_or(super::NOT_SIGNED_IN)?;
            let client = build_client(&base_url, token)?;
            let runtime = tokio::runtime::Runtime::new()?;
            let pulled = runtime.block_on(sync::pull(&client, store.as_ref(), &profile.id))?;
            println!("Pulled {pulled} session(s).");
        }
    }
    Ok(())
}

fn build_client(
    base_url: &str,
    token: Option<String>,
) -> Result<RemoteLedgerClient, Box<dyn std::error::Error>> {
    let client = RemoteLedgerClient::new(base_url)?;
    Ok(match token {
        Some(token) => client.with_bearer(token),
        None => client,
    })
}
