//! Debounced queue of pending remote-ledger operations.
//!
//! Rapid edits to the same session collapse into one pending op; ops
//! become drainable once their debounce window passes. The queue
//! survives restarts as JSON in the data directory. An op still pending
//! at shutdown that never got persisted is acceptable loss.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::ledger::FocusSession;
use crate::store::data_dir;

const QUEUE_FILE: &str = "sync_queue.json";
const DEBOUNCE_SECONDS: i64 = 3;

/// One remote-ledger operation awaiting upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerOp {
    Upsert { session: FocusSession },
    Delete { id: String, owner_id: String },
}

impl LedgerOp {
    /// The session this op targets. Ops for the same session coalesce.
    pub fn session_id(&self) -> &str {
        match self {
            LedgerOp::Upsert { session } => &session.id,
            LedgerOp::Delete { id, .. } => id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            LedgerOp::Upsert { session } => &session.owner_id,
            LedgerOp::Delete { owner_id, .. } => owner_id,
        }
    }
}

/// Pending op with its debounce timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingOp {
    op: LedgerOp,
    debounce_until: DateTime<Utc>,
}

/// Queue batching remote-ledger uploads.
pub struct SyncQueue {
    /// Pending ops by session id, so later edits supersede earlier ones.
    pending: HashMap<String, PendingOp>,
    /// When the earliest pending op becomes drainable.
    next_ready: Option<DateTime<Utc>>,
    /// Persistent queue file path.
    queue_file: PathBuf,
}

impl SyncQueue {
    pub fn new() -> Self {
        let data_dir = data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new_with_path(data_dir.join(QUEUE_FILE))
    }

    /// Create a queue backed by a specific file (for testing).
    pub fn new_with_path(path: PathBuf) -> Self {
        Self {
            pending: HashMap::new(),
            next_ready: None,
            queue_file: path,
        }
    }

    /// Enqueue an op. A pending op for the same session is replaced and
    /// the debounce window restarts.
    pub fn enqueue(&mut self, op: LedgerOp) {
        let debounce_until = Utc::now() + Duration::seconds(DEBOUNCE_SECONDS);
        self.pending.insert(
            op.session_id().to_string(),
            PendingOp { op, debounce_until },
        );
        self.update_next_ready();
    }

    /// Drain up to n ops whose debounce window has passed.
    pub fn drain_ready(&mut self, n: usize) -> Vec<LedgerOp> {
        let now = Utc::now();
        let mut ready = Vec::new();

        self.pending.retain(|_, pending| {
            if pending.debounce_until <= now && ready.len() < n {
                ready.push(pending.op.clone());
                false
            } else {
                true
            }
        });

        self.update_next_ready();
        ready
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time until the next op becomes drainable, `None` when empty.
    pub fn time_until_next_batch(&self) -> Option<Duration> {
        self.next_ready.map(|t| {
            let now = Utc::now();
            if t > now {
                t - now
            } else {
                Duration::zero()
            }
        })
    }

    /// Persist pending ops to disk.
    pub fn persist(&self) -> Result<(), std::io::Error> {
        let data = serde_json::to_string_pretty(&self.pending)?;
        std::fs::write(&self.queue_file, data)?;
        Ok(())
    }

    /// Load pending ops from disk. Missing file is an empty queue.
    pub fn load(&mut self) -> Result<(), std::io::Error> {
        if !self.queue_file.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.queue_file)?;
        let loaded: HashMap<String, PendingOp> = serde_json::from_str(&content)?;
        self.pending = loaded;
        self.update_next_ready();
        Ok(())
    }

    fn update_next_ready(&mut self) {
        self.next_ready = self.pending.values().map(|p| p.debounce_until).min();
    }

    /// Rewind every debounce window so tests need not sleep it out.
    #[cfg(test)]
    pub(crate) fn expire_debounce(&mut self) {
        let now = Utc::now();
        for pending in self.pending.values_mut() {
            pending.debounce_until = now;
        }
        self.update_next_ready();
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SessionOutcome;
    use tempfile::TempDir;

    fn upsert(id_hint: u32) -> LedgerOp {
        let mut session = FocusSession::new("owner-1", SessionOutcome::Completed, 25);
        session.id = format!("session-{id_hint}");
        LedgerOp::Upsert { session }
    }

    #[test]
    fn enqueue_and_drain() {
        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        queue.enqueue(upsert(1));
        assert_eq!(queue.len(), 1);

        // Nothing is ready inside the debounce window
        assert!(queue.drain_ready(10).is_empty());
        assert_eq!(queue.len(), 1);

        queue.expire_debounce();
        let drained = queue.drain_ready(10);
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn later_op_for_same_session_supersedes() {
        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        queue.enqueue(upsert(1));
        queue.enqueue(LedgerOp::Delete {
            id: "session-1".to_string(),
            owner_id: "owner-1".to_string(),
        });

        assert_eq!(queue.len(), 1);

        queue.expire_debounce();
        let drained = queue.drain_ready(10);
        assert!(matches!(drained[0], LedgerOp::Delete { .. }));
    }

    #[test]
    fn drain_respects_the_limit() {
        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        for i in 0..5 {
            queue.enqueue(upsert(i));
        }

        queue.expire_debounce();
        let drained = queue.drain_ready(3);
        assert_eq!(drained.len(), 3);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn time_until_next_batch_tracks_debounce() {
        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        assert!(queue.time_until_next_batch().is_none());

        queue.enqueue(upsert(1));
        let next = queue.time_until_next_batch().unwrap();
        assert!(next.num_seconds() >= 0);
        assert!(next.num_seconds() <= DEBOUNCE_SECONDS);

        queue.expire_debounce();
        assert_eq!(queue.time_until_next_batch(), Some(Duration::zero()));
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.json");

        let mut queue = SyncQueue::new_with_path(path.clone());
        queue.enqueue(upsert(7));
        queue.persist().unwrap();

        let mut restored = SyncQueue::new_with_path(path);
        restored.load().unwrap();
        assert_eq!(restored.len(), 1);

        restored.expire_debounce();
        let drained = restored.drain_ready(10);
        assert_eq!(drained[0].session_id(), "session-7");
        assert_eq!(drained[0].owner_id(), "owner-1");
    }

    #[test]
    fn loading_a_missing_file_is_fine() {
        let temp_dir = TempDir::new().unwrap();
        let mut queue = SyncQueue::new_with_path(temp_dir.path().join("absent.json"));
        queue.load().unwrap();
        assert!(queue.is_empty());
    }
}
