//! docsync Core Library
//!
//! Client side of collaborative document sync: keeps local document copies
//! in step with a remote authority over a reconnecting bidirectional
//! channel, with a read-only HTTP snapshot fallback when no channel is
//! available.
//!
//! # Quick Start
//!
//! ```text
//! let teardown = TeardownRegistry::new();
//! let channel = Arc::new(WsChannel::new(WsChannelConfig::new("ws://localhost:3010")));
//! let client = LiveSyncClient::new("workspace-1", channel, &teardown);
//!
//! // Catch up a local copy
//! if let Some(result) = client.pull("doc-1", &local_state).await? {
//!     apply(result.data);
//! }
//!
//! // Receive remote updates
//! let subscription = client.subscribe(|doc_id, update| apply(update), |_reason| {})?;
//! ```
//!
//! # Modules
//!
//! - `sync`: Live and static sync clients (main entry point)
//! - `channel`: Bidirectional event channel contract and implementations
//! - `codec`: Binary to transport-safe text encoding
//! - `lifecycle`: Teardown hook registration
//! - `logging`: Logging sink used by the clients
//! - `config`: Sync configuration

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod sync;

pub use channel::{Channel, MockChannel, WsChannel, WsChannelConfig};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use lifecycle::{Lifecycle, TeardownRegistry};
pub use logging::{CapturingLogger, SyncLogger, TracingLogger};
pub use sync::{
    DocStorage, DocSyncStorage, LiveSyncClient, PullResult, StaticSyncClient, Subscription,
};
