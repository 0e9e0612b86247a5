//! Dual-mode document storage
//!
//! [`DocSyncStorage`] is the surface higher layers sync through;
//! [`DocStorage`] picks the live or the static implementation at runtime.

use std::future::Future;

use super::{LiveSyncClient, PullResult, StaticSyncClient, Subscription};
use crate::channel::Channel;
use crate::error::SyncResult;

/// Pull/push/subscribe for the documents of one workspace
pub trait DocSyncStorage: Send + Sync {
    /// Fetch what a copy at `state` is missing; `Ok(None)` if the document is absent
    fn pull(
        &self,
        doc_id: &str,
        state: &[u8],
    ) -> impl Future<Output = SyncResult<Option<PullResult>>> + Send;

    /// Send one local update
    fn push(&self, doc_id: &str, update: &[u8]) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deliver remote updates until cancelled or disconnected
    fn subscribe<U, D>(&self, on_update: U, on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static;
}

impl<C: Channel> DocSyncStorage for LiveSyncClient<C> {
    async fn pull(&self, doc_id: &str, state: &[u8]) -> SyncResult<Option<PullResult>> {
        LiveSyncClient::pull(self, doc_id, state).await
    }

    async fn push(&self, doc_id: &str, update: &[u8]) -> SyncResult<()> {
        LiveSyncClient::push(self, doc_id, update).await
    }

    fn subscribe<U, D>(&self, on_update: U, on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static,
    {
        LiveSyncClient::subscribe(self, on_update, on_disconnect)
    }
}

impl DocSyncStorage for StaticSyncClient {
    async fn pull(&self, doc_id: &str, _state: &[u8]) -> SyncResult<Option<PullResult>> {
        StaticSyncClient::pull(self, doc_id).await
    }

    async fn push(&self, doc_id: &str, update: &[u8]) -> SyncResult<()> {
        StaticSyncClient::push(self, doc_id, update).await
    }

    fn subscribe<U, D>(&self, on_update: U, on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static,
    {
        StaticSyncClient::subscribe(self, on_update, on_disconnect)
    }
}

/// Either sync mode behind one type
pub enum DocStorage<C: Channel> {
    /// Full sync over a live channel
    Live(LiveSyncClient<C>),
    /// Read-only snapshots over HTTP
    Static(StaticSyncClient),
}

impl<C: Channel> DocStorage<C> {
    /// Whether live sync (push and subscribe) is available
    pub fn is_live(&self) -> bool {
        matches!(self, DocStorage::Live(_))
    }

    /// Get the workspace this storage is bound to
    pub fn workspace_id(&self) -> &str {
        match self {
            DocStorage::Live(client) => client.workspace_id(),
            DocStorage::Static(client) => client.workspace_id(),
        }
    }
}

impl<C: Channel> DocSyncStorage for DocStorage<C> {
    async fn pull(&self, doc_id: &str, state: &[u8]) -> SyncResult<Option<PullResult>> {
        match self {
            DocStorage::Live(client) => client.pull(doc_id, state).await,
            DocStorage::Static(client) => client.pull(doc_id).await,
        }
    }

    async fn push(&self, doc_id: &str, update: &[u8]) -> SyncResult<()> {
        match self {
            DocStorage::Live(client) => client.push(doc_id, update).await,
            DocStorage::Static(client) => client.push(doc_id, update).await,
        }
    }

    fn subscribe<U, D>(&self, on_update: U, on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static,
    {
        match self {
            DocStorage::Live(client) => client.subscribe(on_update, on_disconnect),
            DocStorage::Static(client) => client.subscribe(on_update, on_disconnect),
        }
    }
}
