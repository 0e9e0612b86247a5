//! Sync session setup
//!
//! Chooses live or snapshot mode for one workspace and runs teardown when
//! the command is done.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{info, warn};

use docsync_core::channel::EVENT_CONNECT;
use docsync_core::sync::ClientOptions;
use docsync_core::{
    Channel, DocStorage, LiveSyncClient, StaticSyncClient, SyncConfig, TeardownRegistry, WsChannel,
};

/// Storage for one workspace plus what it takes to shut it down
pub struct Session {
    storage: DocStorage<WsChannel>,
    channel: Option<Arc<WsChannel>>,
    teardown: TeardownRegistry,
}

impl Session {
    /// Open a session, preferring the live channel
    ///
    /// Falls back to snapshots when the channel does not connect within
    /// `connect_timeout_ms`, or when `force_static` is set.
    pub async fn open(config: &SyncConfig, workspace_id: &str, force_static: bool) -> Result<Self> {
        let teardown = TeardownRegistry::new();

        if let Some(channel_config) = config.channel_config().filter(|_| !force_static) {
            let channel = Arc::new(WsChannel::new(channel_config));
            if wait_for_connect(&channel, config.connect_timeout()).await {
                info!("Live sync connected to {}", channel.url());
                let options = ClientOptions {
                    request_timeout: config.request_timeout(),
                    ..ClientOptions::default()
                };
                let client = LiveSyncClient::with_options(
                    workspace_id,
                    Arc::clone(&channel),
                    &teardown,
                    options,
                );
                return Ok(Self {
                    storage: DocStorage::Live(client),
                    channel: Some(channel),
                    teardown,
                });
            }

            warn!(
                "Live sync at {} unavailable, falling back to snapshots",
                channel.url()
            );
            channel.close().await;
        }

        let Some(ref http_url) = config.http_url else {
            bail!(
                "No usable sync server. Configure one with:\n  \
                 docsync config set server_url ws://your-server:3010\n  \
                 docsync config set http_url http://your-server:3010"
            );
        };

        let client = StaticSyncClient::new(http_url, workspace_id)
            .with_context(|| format!("Invalid http_url: {}", http_url))?;
        Ok(Self {
            storage: DocStorage::Static(client),
            channel: None,
            teardown,
        })
    }

    pub fn storage(&self) -> &DocStorage<WsChannel> {
        &self.storage
    }

    /// Name of the active mode
    pub fn mode(&self) -> &'static str {
        if self.storage.is_live() {
            "live"
        } else {
            "static"
        }
    }

    /// Run teardown hooks and close the channel
    pub async fn close(self) {
        self.teardown.shutdown();
        if let Some(channel) = self.channel {
            channel.close().await;
        }
    }
}

/// Start the channel and wait until it reports connected
async fn wait_for_connect(channel: &WsChannel, timeout: Duration) -> bool {
    let (connected_tx, connected_rx) = oneshot::channel();
    let connected_tx = Mutex::new(Some(connected_tx));
    let listener = channel.on(
        EVENT_CONNECT,
        Arc::new(move |_: &Value| {
            if let Some(tx) = connected_tx.lock().ok().and_then(|mut tx| tx.take()) {
                let _ = tx.send(());
            }
        }),
    );

    channel.connect();
    let connected = channel.is_connected()
        || tokio::time::timeout(timeout, connected_rx)
            .await
            .is_ok_and(|r| r.is_ok());

    channel.off(EVENT_CONNECT, listener);
    connected
}
