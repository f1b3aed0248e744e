pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteStore;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::ledger::FocusSession;

/// Persistence seam for session records.
///
/// The ledger talks to storage only through this trait, so the SQLite
/// writer-of-record and test doubles are interchangeable. Results for an
/// owner come back newest-first.
pub trait SessionStore: Send + Sync {
    fn insert_session(&self, session: &FocusSession) -> Result<(), StoreError>;

    /// Returns true if a record with that id existed and was removed.
    fn delete_session(&self, owner_id: &str, id: &str) -> Result<bool, StoreError>;

    fn sessions_for_owner(&self, owner_id: &str) -> Result<Vec<FocusSession>, StoreError>;

    /// Account deletion wipes every record the owner has.
    fn delete_sessions_for_owner(&self, owner_id: &str) -> Result<u64, StoreError>;
}

/// Returns `~/.config/evergreen-focus[-dev]/` based on EVERGREEN_ENV.
///
/// Set EVERGREEN_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("EVERGREEN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("evergreen-focus-dev")
    } else {
        base_dir.join("evergreen-focus")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
