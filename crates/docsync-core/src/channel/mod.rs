//! Bidirectional event channel
//!
//! The sync clients only consume this contract: fire-and-forget events,
//! acknowledged requests with a caller-bound timeout, listener management,
//! and connect/disconnect lifecycle notifications.
//!
//! ## Implementations
//!
//! - [`WsChannel`]: JSON envelopes over a reconnecting WebSocket
//! - [`MockChannel`]: scripted replies and simulated lifecycle for tests

mod mock;
mod registry;
mod ws;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::SyncResult;

pub use mock::MockChannel;
pub use registry::{Handler, ListenerId, ListenerRegistry};
pub use ws::{WsChannel, WsChannelConfig};

/// Dispatched (with a `null` payload) when the channel becomes connected
pub const EVENT_CONNECT: &str = "connect";

/// Dispatched with the disconnect reason (a string) when the channel drops
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Connection handle shared by the sync clients of one process
pub trait Channel: Send + Sync + 'static {
    /// Send an event without waiting for a reply
    ///
    /// Emission while disconnected is queued or dropped by the channel; it
    /// never fails from the caller's perspective.
    fn emit(&self, event: &str, payload: Value);

    /// Send a request and wait up to `timeout` for its acknowledgement
    ///
    /// Fails with [`SyncError::Timeout`](crate::SyncError::Timeout) when no
    /// reply arrives in time.
    fn emit_with_ack(
        &self,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> impl Future<Output = SyncResult<Value>> + Send;

    /// Install a handler for an event
    fn on(&self, event: &str, handler: Handler) -> ListenerId;

    /// Remove a handler installed with [`Channel::on`]. Removing twice is a no-op.
    fn off(&self, event: &str, id: ListenerId);

    /// Ask the channel to establish its connection
    fn connect(&self);

    /// Whether the channel is currently connected
    fn is_connected(&self) -> bool;
}
