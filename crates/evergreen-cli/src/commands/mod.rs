//! Command implementations, one module per top-level subcommand.

pub mod auth;
pub mod focus;
pub mod history;
pub mod prefs;
pub mod status;
pub mod sync;

use std::io::Write;
use std::sync::Arc;

use evergreen_core::{AuthService, SessionLedger, SessionStore, SqliteStore, UserProfile};

pub(crate) const NOT_SIGNED_IN: &str = "Not signed in. Run 'evergreen auth sign-in' first.";

/// Open the store and restore the persisted session, if any.
pub(crate) fn open_session(
) -> Result<(Arc<SqliteStore>, AuthService, Option<UserProfile>), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open()?);
    let auth = AuthService::new(Arc::clone(&store))?;
    let profile = auth.restore()?;
    Ok((store, auth, profile))
}

/// Session ledger bound to the signed-in user.
pub(crate) fn bound_ledger(
    store: &Arc<SqliteStore>,
    user: &UserProfile,
) -> Result<Arc<SessionLedger>, Box<dyn std::error::Error>> {
    let ledger = Arc::new(SessionLedger::new(
        Arc::clone(store) as Arc<dyn SessionStore>
    ));
    ledger.bind(&user.id)?;
    Ok(ledger)
}

/// Ask a yes/no question on stdin. Anything but an explicit yes is no.
pub(crate) fn confirm(prompt: &str) -> Result<bool, std::io::Error> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes"))
}
