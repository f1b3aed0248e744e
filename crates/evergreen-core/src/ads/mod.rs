//! Ad session lifecycle.
//!
//! `AdSessionManager` owns per-placement load state and fronts a pluggable
//! [`AdNetwork`]. Ad failures must never interrupt a focus session, so
//! every network error is absorbed here and logged at debug level; this is
//! the only layer allowed to swallow errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Where an ad can appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdPlacement {
    Banner,
    Interstitial,
    Rewarded,
    AppOpen,
}

impl AdPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdPlacement::Banner => "banner",
            AdPlacement::Interstitial => "interstitial",
            AdPlacement::Rewarded => "rewarded",
            AdPlacement::AppOpen => "app_open",
        }
    }
}

/// SDK seam. Real front-ends wrap their ad vendor behind this; headless
/// builds use [`NoopAdNetwork`].
pub trait AdNetwork: Send + Sync {
    /// One-time SDK initialization.
    fn initialize(&self) -> Result<(), Box<dyn std::error::Error>>;

    /// Fetch a fill for the placement.
    fn load(&self, placement: AdPlacement) -> Result<(), Box<dyn std::error::Error>>;

    /// Present a previously loaded fill.
    fn show(&self, placement: AdPlacement) -> Result<(), Box<dyn std::error::Error>>;

    /// Release SDK resources.
    fn teardown(&self) {}
}

/// Network that fills nothing and never fails. Default for the CLI.
pub struct NoopAdNetwork;

impl AdNetwork for NoopAdNetwork {
    fn initialize(&self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn load(&self, _placement: AdPlacement) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn show(&self, _placement: AdPlacement) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Explicit ad lifecycle: init, load, show, teardown.
///
/// A placement must be loaded before it can be shown; showing consumes
/// the fill and immediately requests the next one, mirroring how the
/// mobile SDKs recycle interstitials.
pub struct AdSessionManager {
    network: Box<dyn AdNetwork>,
    initialized: AtomicBool,
    loaded: Mutex<HashMap<AdPlacement, bool>>,
}

impl AdSessionManager {
    pub fn new(network: Box<dyn AdNetwork>) -> Self {
        Self {
            network,
            initialized: AtomicBool::new(false),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Manager wired to the no-op network.
    pub fn disabled() -> Self {
        Self::new(Box::new(NoopAdNetwork))
    }

    fn loaded(&self) -> MutexGuard<'_, HashMap<AdPlacement, bool>> {
        self.loaded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initialize the underlying SDK. Safe to call more than once.
    pub fn init(&self) {
        if self.initialized.load(Ordering::SeqCst) {
            return;
        }
        match self.network.initialize() {
            Ok(()) => {
                self.initialized.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::debug!("ad network init failed: {e}");
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Request a fill for the placement. No-op until `init` succeeds.
    pub fn load(&self, placement: AdPlacement) {
        if !self.is_initialized() {
            return;
        }
        match self.network.load(placement) {
            Ok(()) => {
                self.loaded().insert(placement, true);
            }
            Err(e) => {
                tracing::debug!(placement = placement.as_str(), "ad load failed: {e}");
            }
        }
    }

    pub fn is_loaded(&self, placement: AdPlacement) -> bool {
        self.loaded().get(&placement).copied().unwrap_or(false)
    }

    /// Show the placement if a fill is ready. Returns whether an ad was
    /// presented. The fill is consumed and the next one is requested.
    pub fn show(&self, placement: AdPlacement) -> bool {
        if !self.is_loaded(placement) {
            return false;
        }
        self.loaded().insert(placement, false);
        match self.network.show(placement) {
            Ok(()) => {
                self.load(placement);
                true
            }
            Err(e) => {
                tracing::debug!(placement = placement.as_str(), "ad show failed: {e}");
                self.load(placement);
                false
            }
        }
    }

    /// Drop all fills and shut the SDK down.
    pub fn teardown(&self) {
        self.loaded().clear();
        if self.initialized.swap(false, Ordering::SeqCst) {
            self.network.teardown();
        }
    }
}
