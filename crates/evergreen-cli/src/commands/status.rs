//! Combined app state, the CLI counterpart of the dashboard header.

use evergreen_core::route::{self, LoadState};
use evergreen_core::{Preferences, Screen, SyncQueue, Theme, UserProfile};
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    /// Screen the app would land on right now.
    route: Screen,
    user: Option<UserProfile>,
    has_onboarded: bool,
    theme: Theme,
    streak: u32,
    pending_sync: usize,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (store, _auth, profile) = super::open_session()?;
    let prefs = Preferences::load_or_default();

    let route = route::resolve(
        LoadState::Ready(profile.as_ref()),
        LoadState::Ready(prefs.has_onboarded),
        Screen::Dashboard,
    )
    .unwrap_or(Screen::Dashboard);

    let streak = match &profile {
        Some(user) => super::bound_ledger(&store, user)?.streak_length(),
        None => 0,
    };

    let mut queue = SyncQueue::new();
    let _ = queue.load();

    let report = StatusReport {
        route,
        user: profile,
        has_onboarded: prefs.has_onboarded,
        theme: prefs.theme,
        streak,
        pending_sync: queue.len(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
