//! Static snapshot client
//!
//! Read-only fallback used when no bidirectional channel is available: one
//! plain GET per document, no push, no live updates.

use std::sync::Arc;

use reqwest::Url;

use super::{PullResult, Subscription};
use crate::error::{SyncError, SyncResult};
use crate::logging::{SyncLogger, TracingLogger};

/// Request priority hint sent with snapshot fetches (RFC 9218, highest urgency)
const PRIORITY_HIGH: &str = "u=0";

/// Snapshot client for one workspace
#[derive(Clone)]
pub struct StaticSyncClient {
    http: reqwest::Client,
    base_url: Url,
    workspace_id: String,
    logger: Arc<dyn SyncLogger>,
}

impl StaticSyncClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: &str, workspace_id: impl Into<String>) -> SyncResult<Self> {
        Self::with_client(reqwest::Client::new(), base_url, workspace_id)
    }

    /// Create a client reusing an existing HTTP client
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        workspace_id: impl Into<String>,
    ) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http,
            base_url,
            workspace_id: workspace_id.into(),
            logger: Arc::new(TracingLogger),
        })
    }

    /// Replace the logging sink
    pub fn with_logger(mut self, logger: Arc<dyn SyncLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Get the workspace this client is bound to
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// URL of one document's snapshot: `/api/workspaces/{workspace}/docs/{doc}`
    pub fn doc_url(&self, doc_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "api",
                "workspaces",
                self.workspace_id.as_str(),
                "docs",
                doc_id,
            ]);
        }
        url
    }

    /// Fetch the full snapshot of a document
    ///
    /// Any non-success status reads as absence (`Ok(None)`); the result never
    /// carries a state vector. Timeouts are left to the HTTP client.
    pub async fn pull(&self, doc_id: &str) -> SyncResult<Option<PullResult>> {
        let url = self.doc_url(doc_id);
        self.logger.debug("snapshot", &format!("GET {}", url));

        let response = self
            .http
            .get(url)
            .header("Priority", PRIORITY_HIGH)
            .send()
            .await
            .map_err(|e| {
                self.logger
                    .error("snapshot", &format!("Fetch of {} failed: {}", doc_id, e));
                e
            })?;

        if !response.status().is_success() {
            self.logger.debug(
                "snapshot",
                &format!("No snapshot for {} ({})", doc_id, response.status()),
            );
            return Ok(None);
        }

        let body = response.bytes().await?;
        Ok(Some(PullResult {
            data: body.to_vec(),
            state: None,
        }))
    }

    /// Always fails: snapshots are read-only
    pub async fn push(&self, _doc_id: &str, _update: &[u8]) -> SyncResult<()> {
        Err(SyncError::NotImplemented("push"))
    }

    /// Always fails: there is no live channel
    pub fn subscribe<U, D>(&self, _on_update: U, _on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static,
    {
        Err(SyncError::NotImplemented("subscribe"))
    }
}
