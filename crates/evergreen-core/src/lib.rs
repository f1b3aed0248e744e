//! # Evergreen Focus Core Library
//!
//! This library provides the core business logic for the Evergreen Focus
//! timer. It implements a CLI-first philosophy where all operations are
//! available via a standalone CLI binary, with any GUI shell being a thin
//! layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timer Machine**: a count-based state machine that requires the
//!   caller (or the controller's tick task) to invoke `tick()` once per
//!   elapsed second
//! - **Session Ledger**: observable in-memory view over persisted focus
//!   sessions, with streak and date-filter queries
//! - **Storage**: SQLite-based session/account storage and TOML-based
//!   preferences
//! - **Auth**: local email/password and guest accounts with signed
//!   session tokens
//! - **Sync**: explicit push/pull mirror against the hosted document
//!   store
//! - **Ads**: best-effort ad lifecycle manager that never blocks the
//!   primary flow
//!
//! ## Key Components
//!
//! - [`FocusTimerMachine`]: core timer state machine
//! - [`FocusController`]: wires the machine to ticks, ledger, and ads
//! - [`SessionLedger`]: session history, streaks, subscriptions
//! - [`SqliteStore`]: session and account persistence
//! - [`AuthService`]: account management

pub mod ads;
pub mod auth;
pub mod error;
pub mod events;
pub mod ledger;
pub mod prefs;
pub mod route;
pub mod store;
pub mod sync;
pub mod timer;

pub use ads::{AdNetwork, AdPlacement, AdSessionManager, NoopAdNetwork};
pub use auth::{AuthService, SessionToken, UserProfile};
pub use error::{
    AuthError, ConfigError, CoreError, Result, StoreError, SyncError, ValidationError,
};
pub use events::Event;
pub use ledger::{FocusSession, LedgerSubscription, SessionLedger, SessionOutcome};
pub use prefs::{Preferences, Theme};
pub use route::{LoadState, Screen};
pub use store::{SessionStore, SqliteStore};
pub use sync::{LedgerOp, RemoteLedgerClient, SyncQueue, SyncStatus};
pub use timer::{FocusController, FocusTimerMachine, TickSource, TimerPhase};
