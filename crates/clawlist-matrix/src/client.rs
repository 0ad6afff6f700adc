use std::fmt;
use std::time::Duration;

use clawlist_types::RoomEvent;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::MatrixError;
use crate::types::{MessagesResponse, SendResponse, SyncFilter, SyncResponse};

/// Server-side long-poll window for `/sync`, in milliseconds.
pub const SYNC_TIMEOUT_MS: u64 = 30_000;

/// Client-side request timeout. Sits above the long-poll window so a
/// healthy long-poll is never cut short while a dead socket still fails.
const REQUEST_TIMEOUT: Duration = Duration::from_millis(SYNC_TIMEOUT_MS + 15_000);

/// Authenticated client for one homeserver and one access token.
#[derive(Clone)]
pub struct MatrixClient {
    http: reqwest::Client,
    base: Url,
    access_token: String,
}

impl fmt::Debug for MatrixClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixClient")
            .field("base", &self.base.as_str())
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl MatrixClient {
    /// Creates a client for `homeserver` (e.g. `http://127.0.0.1:18008`).
    pub fn new(homeserver: &str, access_token: impl Into<String>) -> Result<Self, MatrixError> {
        let base = Url::parse(homeserver)
            .map_err(|e| MatrixError::InvalidHomeserver(format!("{homeserver}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(MatrixError::InvalidHomeserver(homeserver.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("clawlist/0.0.1")
            .build()?;
        Ok(Self {
            http,
            base,
            access_token: access_token.into(),
        })
    }

    /// Builds `<homeserver>/_matrix/client/v3/<segments...>`. Each segment is
    /// percent-encoded, so room ids like `!abc:localhost` are safe.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MatrixError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MatrixError::InvalidHomeserver(self.base.to_string()))?
            .pop_if_empty()
            .extend(["_matrix", "client", "v3"])
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MatrixError> {
        let resp = request.bearer_auth(&self.access_token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MatrixError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Long-polls `/sync`.
    ///
    /// `since` is the continuation token from the previous response, absent
    /// on the first call. The server holds the request for up to
    /// `timeout_ms` when there is nothing new.
    pub async fn sync(
        &self,
        since: Option<&str>,
        filter: &SyncFilter,
        timeout_ms: u64,
    ) -> Result<SyncResponse, MatrixError> {
        let url = self.endpoint(&["sync"])?;
        let mut query = vec![
            ("timeout", timeout_ms.to_string()),
            ("filter", filter.to_json()?),
        ];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }
        tracing::debug!(since = ?since, "syncing");
        self.execute(self.http.get(url).query(&query)).await
    }

    /// Fetches one page of room history, newest first (`dir=b`).
    pub async fn messages(
        &self,
        room_id: &str,
        from: Option<&str>,
        limit: u32,
    ) -> Result<MessagesResponse, MatrixError> {
        let url = self.endpoint(&["rooms", room_id, "messages"])?;
        let mut query = vec![("dir", "b".to_string()), ("limit", limit.to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_string()));
        }
        self.execute(self.http.get(url).query(&query)).await
    }

    /// Pages backwards through room history until the server stops
    /// returning a continuation token, a page comes back empty, or
    /// `max_pages` pages have been read. Events are returned newest first.
    pub async fn backfill(
        &self,
        room_id: &str,
        page_limit: u32,
        max_pages: usize,
    ) -> Result<Vec<RoomEvent>, MatrixError> {
        let mut events = Vec::new();
        let mut from: Option<String> = None;

        for _ in 0..max_pages {
            let page = self.messages(room_id, from.as_deref(), page_limit).await?;
            let exhausted = page.chunk.is_empty();
            events.extend(page.chunk.into_iter().map(|raw| raw.into_room_event()));
            match page.end {
                Some(end) if !exhausted => from = Some(end),
                _ => break,
            }
        }

        tracing::debug!(room = room_id, count = events.len(), "backfilled room history");
        Ok(events)
    }

    /// Sends a plain-text message and returns the new event id.
    ///
    /// Each call uses a fresh transaction id, so retries by the caller are
    /// distinct sends.
    pub async fn send_text(&self, room_id: &str, body: &str) -> Result<String, MatrixError> {
        let txn_id = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint(&["rooms", room_id, "send", "m.room.message", &txn_id])?;
        let content = serde_json::json!({ "msgtype": "m.text", "body": body });
        let sent: SendResponse = self.execute(self.http.put(url).json(&content)).await?;
        Ok(sent.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_room_ids() {
        let client = MatrixClient::new("http://127.0.0.1:18008/", "tok").unwrap();
        let url = client
            .endpoint(&["rooms", "!market:localhost", "messages"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:18008/_matrix/client/v3/rooms/!market:localhost/messages"
        );
        let url = client.endpoint(&["rooms", "a/b", "messages"]).unwrap();
        assert!(url.as_str().ends_with("/rooms/a%2Fb/messages"));
    }

    #[test]
    fn invalid_homeserver_is_rejected() {
        assert!(matches!(
            MatrixClient::new("not a url", "tok"),
            Err(MatrixError::InvalidHomeserver(_))
        ));
        assert!(matches!(
            MatrixClient::new("mailto:ops@example.com", "tok"),
            Err(MatrixError::InvalidHomeserver(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let client = MatrixClient::new("http://localhost:8008", "syt_secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("syt_secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
