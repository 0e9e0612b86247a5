//! Document sync clients
//!
//! Two ways of keeping a local document copy in step with the server:
//!
//! - [`LiveSyncClient`]: pull/push/subscribe over a bidirectional [`Channel`]
//! - [`StaticSyncClient`]: read-only snapshot fetch over plain HTTP, used
//!   when no channel is available
//!
//! Higher layers hold a [`DocStorage`] and do not care which one is active.
//!
//! [`Channel`]: crate::channel::Channel

mod live;
pub mod message;
mod snapshot;
mod storage;

use std::fmt;
use std::sync::Arc;

pub use live::{ClientOptions, LiveSyncClient, SessionState, REQUEST_TIMEOUT};
pub use snapshot::StaticSyncClient;
pub use storage::{DocStorage, DocSyncStorage};

/// Delta needed to catch a local copy up with the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    /// Update to apply locally
    pub data: Vec<u8>,
    /// Server's current state vector, when it sent one
    pub state: Option<Vec<u8>>,
}

/// Handle for a live update subscription
///
/// `cancel` removes the listeners installed by `subscribe` and nothing else.
/// Dropping the handle does not cancel.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Arc::new(cancel),
        }
    }

    /// Stop delivery. Safe to call more than once.
    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
