//! RemoteLedgerClient: session mirror over the hosted document store.
//!
//! Sessions live under `/users/{owner}/focus-sessions` as camelCase
//! JSON documents keyed by session id. The server stamps `timestamp`
//! on write; fetched timestamps are authoritative. Failures surface to
//! the caller, nothing here retries.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SyncError;
use crate::ledger::{FocusSession, SessionOutcome};

const PAGE_SIZE: &str = "100";

/// Wire shape of a session document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
    pub owner_id: String,
    pub status: SessionOutcome,
    pub duration: u32,
    /// Server-generated; omitted on upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub time_planted_seconds: u64,
}

impl SessionDoc {
    fn from_session(session: &FocusSession) -> Self {
        Self {
            owner_id: session.owner_id.clone(),
            status: session.outcome,
            duration: session.duration_min,
            timestamp: None,
            time_planted_seconds: session.time_planted_secs,
        }
    }

    fn into_session(self, id: &str) -> Result<FocusSession, SyncError> {
        let recorded_at = self
            .timestamp
            .ok_or_else(|| SyncError::MalformedResponse("session missing timestamp".into()))?;
        Ok(FocusSession {
            id: id.to_string(),
            owner_id: self.owner_id,
            outcome: self.status,
            duration_min: self.duration,
            recorded_at,
            time_planted_secs: self.time_planted_seconds,
        })
    }
}

/// Client for the remote session mirror.
pub struct RemoteLedgerClient {
    base_url: Url,
    http_client: Client,
    bearer: Option<String>,
}

impl RemoteLedgerClient {
    /// Create a client for the given API root.
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http_client: Client::new(),
            bearer: None,
        })
    }

    /// Attach a bearer token to every request.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    fn sessions_url(&self, owner_id: &str) -> String {
        format!(
            "{}/users/{owner_id}/focus-sessions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Upload one session document, keyed by its id.
    pub async fn push_session(&self, session: &FocusSession) -> Result<(), SyncError> {
        let url = format!("{}/{}", self.sessions_url(&session.owner_id), session.id);
        let doc = SessionDoc::from_session(session);

        let resp = self
            .authorize(self.http_client.put(&url))
            .json(&doc)
            .send()
            .await?;
        read_checked(resp).await?;
        Ok(())
    }

    /// Delete one session document by id.
    pub async fn delete_session(&self, owner_id: &str, id: &str) -> Result<(), SyncError> {
        let url = format!("{}/{id}", self.sessions_url(owner_id));

        let resp = self
            .authorize(self.http_client.delete(&url))
            .send()
            .await?;
        read_checked(resp).await?;
        Ok(())
    }

    /// Fetch every session under the owner, newest first.
    pub async fn fetch_sessions(&self, owner_id: &str) -> Result<Vec<FocusSession>, SyncError> {
        let url = self.sessions_url(owner_id);

        let mut sessions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .authorize(self.http_client.get(&url))
                .query(&[("pageSize", PAGE_SIZE)]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let body = read_checked(request.send().await?).await?;

            if let Some(items) = body["items"].as_array() {
                for item in items {
                    let id = item["id"].as_str().ok_or_else(|| {
                        SyncError::MalformedResponse("session item missing id".into())
                    })?;
                    let doc: SessionDoc = serde_json::from_value(item.clone())
                        .map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
                    sessions.push(doc.into_session(id)?);
                }
            }

            page_token = body["nextPageToken"].as_str().map(|s| s.to_string());

            if page_token.is_none() {
                break;
            }
        }

        sessions.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        Ok(sessions)
    }
}

/// Surface server-side rejections, tolerate empty bodies.
async fn read_checked(resp: reqwest::Response) -> Result<serde_json::Value, SyncError> {
    let status = resp.status();
    let text = resp.text().await?;

    let body: serde_json::Value = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
    };

    if let Some(err) = body.get("error") {
        return Err(SyncError::Rejected {
            status: status.as_u16(),
            message: err.to_string(),
        });
    }
    if !status.is_success() {
        return Err(SyncError::Rejected {
            status: status.as_u16(),
            message: if text.is_empty() { status.to_string() } else { text },
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn session(id: &str, owner: &str) -> FocusSession {
        let mut s = FocusSession::new(owner, SessionOutcome::Completed, 25);
        s.id = id.to_string();
        s
    }

    #[tokio::test]
    async fn push_session_puts_the_wire_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/users/owner-1/focus-sessions/s-1")
            .match_header("authorization", "Bearer token-1")
            .match_body(Matcher::PartialJson(json!({
                "ownerId": "owner-1",
                "status": "Completed",
                "duration": 25,
                "timePlantedSeconds": 1500,
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = RemoteLedgerClient::new(&server.url())
            .unwrap()
            .with_bearer("token-1");
        client.push_session(&session("s-1", "owner-1")).await.unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn uploaded_documents_omit_the_timestamp() {
        let doc = SessionDoc::from_session(&session("s-1", "owner-1"));
        let wire = serde_json::to_string(&doc).unwrap();
        assert!(!wire.contains("timestamp"));
        assert!(wire.contains("\"timePlantedSeconds\":1500"));
    }

    #[tokio::test]
    async fn delete_session_tolerates_an_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/users/owner-1/focus-sessions/s-1")
            .with_status(204)
            .create_async()
            .await;

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        client.delete_session("owner-1", "s-1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_sessions_follows_page_tokens() {
        let mut server = mockito::Server::new_async().await;
        let page1 = server
            .mock("GET", "/users/owner-1/focus-sessions")
            .match_query(Matcher::Regex("^pageSize=100$".to_string()))
            .with_body(
                json!({
                    "items": [{
                        "id": "s-1",
                        "ownerId": "owner-1",
                        "status": "Completed",
                        "duration": 25,
                        "timestamp": "2026-08-24T10:00:00Z",
                        "timePlantedSeconds": 1500,
                    }],
                    "nextPageToken": "page-2",
                })
                .to_string(),
            )
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/users/owner-1/focus-sessions")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "page-2".into()))
            .with_body(
                json!({
                    "items": [{
                        "id": "s-2",
                        "ownerId": "owner-1",
                        "status": "Failed",
                        "duration": 10,
                        "timestamp": "2026-08-25T09:00:00Z",
                        "timePlantedSeconds": 600,
                    }],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let sessions = client.fetch_sessions("owner-1").await.unwrap();

        page1.assert_async().await;
        page2.assert_async().await;

        // Newest first regardless of page order
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "s-2");
        assert_eq!(sessions[0].outcome, SessionOutcome::Failed);
        assert_eq!(sessions[1].id, "s-1");
    }

    #[tokio::test]
    async fn server_rejection_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/users/owner-1/focus-sessions/s-1")
            .with_status(403)
            .with_body(json!({"error": {"message": "permission denied"}}).to_string())
            .create_async()
            .await;

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let err = client
            .push_session(&session("s-1", "owner-1"))
            .await
            .unwrap_err();

        match err {
            SyncError::Rejected { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("permission denied"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_timestamp_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/owner-1/focus-sessions")
            .match_query(Matcher::Any)
            .with_body(
                json!({
                    "items": [{
                        "id": "s-1",
                        "ownerId": "owner-1",
                        "status": "Completed",
                        "duration": 25,
                        "timePlantedSeconds": 1500,
                    }],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = RemoteLedgerClient::new(&server.url()).unwrap();
        let err = client.fetch_sessions("owner-1").await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
    }

    #[test]
    fn bad_base_url_is_rejected_up_front() {
        assert!(matches!(
            RemoteLedgerClient::new("not a url"),
            Err(SyncError::InvalidBaseUrl(_))
        ));
    }
}
