//! Startup and navigation routing rules.
//!
//! A pure resolver that decides, from auth and onboarding state, which
//! screen the user should be on. Priority order:
//!
//! 1. While auth or onboarding state is still loading, hold on splash.
//! 2. A user who has not completed onboarding goes to onboarding.
//! 3. A signed-out user on a protected screen goes to login.
//! 4. A signed-in user on a public screen goes to the dashboard.
//!
//! Anything else stays put.

use serde::{Deserialize, Serialize};

use crate::auth::UserProfile;

/// A value that may still be loading from disk or the keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState<T> {
    Loading,
    Ready(T),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Top-level screens the router can land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Splash,
    Onboarding,
    Login,
    Dashboard,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Splash => "splash",
            Screen::Onboarding => "onboarding",
            Screen::Login => "login",
            Screen::Dashboard => "dashboard",
        }
    }

    /// Screens that require a signed-in user.
    fn is_protected(&self) -> bool {
        matches!(self, Screen::Dashboard)
    }
}

/// Decide whether the user at `at` should be redirected.
///
/// Returns `Some(target)` when a redirect is required, `None` to stay.
pub fn resolve(
    auth: LoadState<Option<&UserProfile>>,
    onboarding: LoadState<bool>,
    at: Screen,
) -> Option<Screen> {
    let (LoadState::Ready(user), LoadState::Ready(has_onboarded)) = (auth, onboarding) else {
        return (at != Screen::Splash).then_some(Screen::Splash);
    };

    // Onboarding outranks everything else.
    if !has_onboarded {
        return (at != Screen::Onboarding).then_some(Screen::Onboarding);
    }

    match user {
        None if at.is_protected() => Some(Screen::Login),
        Some(_) if !at.is_protected() => Some(Screen::Dashboard),
        _ => None,
    }
}
