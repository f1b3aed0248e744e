//! Remote mirror of the session ledger.
//!
//! Local SQLite stays the writer-of-record; this layer pushes queued
//! local changes to the hosted store and pulls the remote set back down
//! on demand. Both directions run only when explicitly invoked.

pub mod queue;
pub mod remote;

use serde::Serialize;

use crate::error::SyncError;
use crate::store::SessionStore;

pub use queue::{LedgerOp, SyncQueue};
pub use remote::{RemoteLedgerClient, SessionDoc};

const FLUSH_BATCH: usize = 20;

/// Queue health for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub pending: usize,
    pub next_batch_in_secs: Option<i64>,
}

impl SyncStatus {
    pub fn of(queue: &SyncQueue) -> Self {
        Self {
            pending: queue.len(),
            next_batch_in_secs: queue.time_until_next_batch().map(|d| d.num_seconds()),
        }
    }
}

/// Push every debounce-expired op to the remote store.
///
/// Stops at the first failure; the failed op goes back on the queue and
/// the error is returned as-is. Returns the number of ops uploaded.
pub async fn flush(
    queue: &mut SyncQueue,
    client: &RemoteLedgerClient,
) -> Result<usize, SyncError> {
    let mut pushed = 0;

    loop {
        let batch = queue.drain_ready(FLUSH_BATCH);
        if batch.is_empty() {
            break;
        }

        for op in batch {
            let result = match &op {
                LedgerOp::Upsert { session } => client.push_session(session).await,
                LedgerOp::Delete { id, owner_id } => client.delete_session(owner_id, id).await,
            };
            if let Err(e) = result {
                tracing::warn!("sync push failed, op requeued: {e}");
                queue.enqueue(op);
                return Err(e);
            }
            pushed += 1;
        }
    }

    tracing::debug!(pushed, "sync flush finished");
    Ok(pushed)
}

/// Mirror the owner's remote sessions into the local store.
///
/// Upserts by id, so repeated pulls converge. Returns the number of
/// records written.
pub async fn pull(
    client: &RemoteLedgerClient,
    store: &dyn SessionStore,
    owner_id: &str,
) -> crate::error::Result<usize> {
    let sessions = client.fetch_sessions(owner_id).await?;
    for session in &sessions {
        store.insert_session(session)?;
    }
    tracing::debug!(pulled = sessions.len(), "sync pull finished");
    Ok(sessions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FocusSession, SessionOutcome};
    use crate::store::SqliteStore;
    use serde_json::json;
    use std::path::PathBuf;

    fn queued_session(id: &str) -> FocusSession {
        let mut s = FocusSession::new("owner-1", SessionOutcome::Completed, 25);
        s.id = id.to_string();
        s
    }

    #[tokio::test]
    async fn flush_pushes_upserts_and_deletes() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/users/owner-1/focus-sessions/s-1")
            .with_body("{}")
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/users/owner-1/focus-sessions/s-2")
            .with_status(204)
            .create_async()
            .await;

        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        queue.enqueue(LedgerOp::Upsert {
            session: queued_session("s-1"),
        });
        queue.enqueue(LedgerOp::Delete {
            id: "s-2".to_string(),
            owner_id: "owner-1".to_string(),
        });
        queue.expire_debounce();

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let pushed = flush(&mut queue, &client).await.unwrap();

        assert_eq!(pushed, 2);
        assert!(queue.is_empty());
        put.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn flush_skips_ops_still_inside_the_debounce_window() {
        let server = mockito::Server::new_async().await;

        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        queue.enqueue(LedgerOp::Upsert {
            session: queued_session("s-1"),
        });

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let pushed = flush(&mut queue, &client).await.unwrap();

        assert_eq!(pushed, 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn failed_op_goes_back_on_the_queue() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/users/owner-1/focus-sessions/s-1")
            .with_status(500)
            .with_body(json!({"error": "backend down"}).to_string())
            .create_async()
            .await;

        let mut queue = SyncQueue::new_with_path(PathBuf::from("unused.json"));
        queue.enqueue(LedgerOp::Upsert {
            session: queued_session("s-1"),
        });
        queue.expire_debounce();

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let err = flush(&mut queue, &client).await.unwrap_err();

        assert!(matches!(err, SyncError::Rejected { status: 500, .. }));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn pull_mirrors_remote_sessions_into_the_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/owner-1/focus-sessions")
            .match_query(mockito::Matcher::Any)
            .with_body(
                json!({
                    "items": [
                        {
                            "id": "s-1",
                            "ownerId": "owner-1",
                            "status": "Completed",
                            "duration": 25,
                            "timestamp": "2026-08-24T10:00:00Z",
                            "timePlantedSeconds": 1500,
                        },
                        {
                            "id": "s-2",
                            "ownerId": "owner-1",
                            "status": "Failed",
                            "duration": 10,
                            "timestamp": "2026-08-25T09:00:00Z",
                            "timePlantedSeconds": 600,
                        },
                    ],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = SqliteStore::open_memory().unwrap();
        let client = RemoteLedgerClient::new(&server.url()).unwrap();

        let pulled = pull(&client, &store, "owner-1").await.unwrap();
        assert_eq!(pulled, 2);

        let local = store.sessions_for_owner("owner-1").unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(local[0].id, "s-2");

        // Pulling again converges instead of duplicating
        let again = pull(&client, &store, "owner-1").await.unwrap();
        assert_eq!(again, 2);
        assert_eq!(store.sessions_for_owner("owner-1").unwrap().len(), 2);
    }
}
