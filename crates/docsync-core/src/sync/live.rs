//! Live sync client
//!
//! Keeps one workspace in sync over a shared [`Channel`]. The client
//! announces itself on every connect, exchanges pull/push requests with a
//! bounded wait and delivers server broadcasts to a subscriber.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::message::{
    ErrorReply, LoadDocData, LoadDocRequest, PushUpdatesRequest, ServerUpdates, EVENT_HANDSHAKE,
    EVENT_LEAVE, EVENT_LOAD_DOC, EVENT_PUSH_UPDATES, EVENT_SERVER_UPDATES,
};
use super::{PullResult, Subscription};
use crate::channel::{Channel, ListenerId, EVENT_CONNECT, EVENT_DISCONNECT};
use crate::codec;
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::Lifecycle;
use crate::logging::{SyncLogger, TracingLogger};

/// Bound on waiting for a pull/push acknowledgement
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Position of a client in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no handshake sent yet
    Constructed,
    /// Handshake sent and the channel is connected
    Announced,
    /// Handshake sent before, channel currently disconnected
    Reconnecting,
    /// Teardown ran; terminal
    TornDown,
}

/// Options for [`LiveSyncClient::with_options`]
#[derive(Clone)]
pub struct ClientOptions {
    pub logger: Arc<dyn SyncLogger>,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            logger: Arc::new(TracingLogger),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Sync client bound to one workspace
pub struct LiveSyncClient<C: Channel> {
    inner: Arc<ClientInner<C>>,
}

struct ClientInner<C: Channel> {
    workspace_id: String,
    channel: Arc<C>,
    logger: Arc<dyn SyncLogger>,
    request_timeout: Duration,
    /// Connect/disconnect listeners installed at construction
    link_listeners: Mutex<Vec<(&'static str, ListenerId)>>,
    announced: AtomicBool,
    /// Handshake already sent on the current connection
    linked: AtomicBool,
    torn_down: AtomicBool,
    /// Liveness flag of the most recent subscription
    subscription: Mutex<Option<Arc<AtomicBool>>>,
}

impl<C: Channel> LiveSyncClient<C> {
    /// Create a client with the default logger and request timeout
    pub fn new(workspace_id: impl Into<String>, channel: Arc<C>, lifecycle: &dyn Lifecycle) -> Self {
        Self::with_options(workspace_id, channel, lifecycle, ClientOptions::default())
    }

    /// Create a client, announce it to the server and register its teardown
    ///
    /// Announces immediately when the channel is connected; otherwise asks
    /// the channel to connect and announces from the connect event.
    pub fn with_options(
        workspace_id: impl Into<String>,
        channel: Arc<C>,
        lifecycle: &dyn Lifecycle,
        options: ClientOptions,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            workspace_id: workspace_id.into(),
            channel,
            logger: options.logger,
            request_timeout: options.request_timeout,
            link_listeners: Mutex::new(Vec::new()),
            announced: AtomicBool::new(false),
            linked: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            subscription: Mutex::new(None),
        });

        let weak: Weak<ClientInner<C>> = Arc::downgrade(&inner);
        let on_connect = inner.channel.on(
            EVENT_CONNECT,
            Arc::new(move |_: &Value| {
                if let Some(inner) = weak.upgrade() {
                    inner.announce_once();
                }
            }),
        );
        let weak: Weak<ClientInner<C>> = Arc::downgrade(&inner);
        let on_disconnect = inner.channel.on(
            EVENT_DISCONNECT,
            Arc::new(move |_: &Value| {
                if let Some(inner) = weak.upgrade() {
                    inner.linked.store(false, Ordering::SeqCst);
                }
            }),
        );
        lock(&inner.link_listeners)
            .extend([(EVENT_CONNECT, on_connect), (EVENT_DISCONNECT, on_disconnect)]);

        // The connect event may also fire for a connection seen here;
        // announce_once keeps it to one handshake per connection.
        if inner.channel.is_connected() {
            inner.announce_once();
        } else {
            inner.channel.connect();
        }

        let teardown = Arc::clone(&inner);
        lifecycle.register_teardown(Box::new(move || teardown.cleanup()));

        Self { inner }
    }

    /// Get the workspace this client is bound to
    pub fn workspace_id(&self) -> &str {
        &self.inner.workspace_id
    }

    /// Get the shared channel
    pub fn channel(&self) -> &Arc<C> {
        &self.inner.channel
    }

    /// Current lifecycle position
    pub fn state(&self) -> SessionState {
        let inner = &self.inner;
        if inner.torn_down.load(Ordering::SeqCst) {
            SessionState::TornDown
        } else if !inner.announced.load(Ordering::SeqCst) {
            SessionState::Constructed
        } else if inner.channel.is_connected() {
            SessionState::Announced
        } else {
            SessionState::Reconnecting
        }
    }

    /// Fetch the delta that brings a copy at `state` up to the remote state
    ///
    /// An empty `state` asks for everything. Returns `Ok(None)` when the
    /// document does not exist remotely. No retry happens here.
    pub async fn pull(&self, doc_id: &str, state: &[u8]) -> SyncResult<Option<PullResult>> {
        let inner = &self.inner;
        let request = LoadDocRequest {
            workspace_id: &inner.workspace_id,
            guid: doc_id,
            state_vector: (!state.is_empty()).then(|| codec::encode(state)),
        };
        let payload = serde_json::to_value(&request)?;

        inner.logger.debug(
            EVENT_LOAD_DOC,
            &format!(
                "Pulling {}/{} from a {} byte state vector",
                inner.workspace_id,
                doc_id,
                state.len()
            ),
        );
        let reply = inner.request(EVENT_LOAD_DOC, payload).await?;

        if let Some(error) = ErrorReply::from_reply(&reply) {
            if error.is_not_found() {
                inner
                    .logger
                    .debug(EVENT_LOAD_DOC, &format!("Document {} not found", doc_id));
                return Ok(None);
            }
            inner.logger.error(
                EVENT_LOAD_DOC,
                &format!("Pull of {} rejected: {}", doc_id, error.message),
            );
            return Err(error.into());
        }

        let data = reply
            .get("data")
            .filter(|data| !data.is_null())
            .ok_or_else(|| SyncError::InvalidReply("pull reply carries no data".to_string()))?;
        let data = LoadDocData::deserialize(data)?;

        Ok(Some(PullResult {
            data: codec::decode(&data.missing)?,
            state: data.state.as_deref().map(codec::decode).transpose()?,
        }))
    }

    /// Send one locally produced update
    ///
    /// All-or-nothing per call; an empty update is forwarded as is.
    pub async fn push(&self, doc_id: &str, update: &[u8]) -> SyncResult<()> {
        let inner = &self.inner;
        let request = PushUpdatesRequest {
            workspace_id: &inner.workspace_id,
            guid: doc_id,
            updates: vec![codec::encode(update)],
        };
        let payload = serde_json::to_value(&request)?;

        inner.logger.debug(
            EVENT_PUSH_UPDATES,
            &format!(
                "Pushing {} byte update to {}/{}",
                update.len(),
                inner.workspace_id,
                doc_id
            ),
        );
        let reply = inner.request(EVENT_PUSH_UPDATES, payload).await?;

        match ErrorReply::from_reply(&reply) {
            Some(error) => {
                inner.logger.error(
                    EVENT_PUSH_UPDATES,
                    &format!("Push to {} rejected: {}", doc_id, error.message),
                );
                Err(error.into())
            }
            None => Ok(()),
        }
    }

    /// Deliver remote updates for this workspace until cancelled or disconnected
    ///
    /// `on_update(doc_id, update)` runs once per update, in broadcast order.
    /// `on_disconnect(reason)` runs once if the channel drops while
    /// subscribed; delivery then stops and `subscribe` must be called again.
    ///
    /// Fails with [`SyncError::AlreadySubscribed`] while a previous
    /// subscription is still active.
    pub fn subscribe<U, D>(&self, on_update: U, on_disconnect: D) -> SyncResult<Subscription>
    where
        U: Fn(&str, Vec<u8>) + Send + Sync + 'static,
        D: Fn(&str) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let active = Arc::new(AtomicBool::new(true));
        {
            let mut current = lock(&inner.subscription);
            if current
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                return Err(SyncError::AlreadySubscribed);
            }
            *current = Some(Arc::clone(&active));
        }

        let workspace_id = inner.workspace_id.clone();
        let logger = Arc::clone(&inner.logger);
        let update_listener = inner.channel.on(
            EVENT_SERVER_UPDATES,
            Arc::new(move |payload: &Value| {
                deliver_updates(&workspace_id, logger.as_ref(), payload, &on_update)
            }),
        );

        let listeners = Arc::new(SubscriptionListeners {
            channel: Arc::downgrade(&inner.channel),
            update: update_listener,
            disconnect: OnceLock::new(),
            active,
        });

        let on_drop = Arc::clone(&listeners);
        let logger = Arc::clone(&inner.logger);
        let disconnect_listener = inner.channel.on(
            EVENT_DISCONNECT,
            Arc::new(move |reason: &Value| {
                if !on_drop.active.swap(false, Ordering::SeqCst) {
                    return;
                }
                on_drop.detach();
                let reason = reason.as_str().unwrap_or("unknown");
                logger.debug(EVENT_DISCONNECT, &format!("Subscription ended: {}", reason));
                on_disconnect(reason);
            }),
        );
        let _ = listeners.disconnect.set(disconnect_listener);

        let handle = Arc::clone(&listeners);
        Ok(Subscription::new(move || handle.detach()))
    }

    /// Announce departure and stop re-announcing on connect
    ///
    /// This is the hook registered with the lifecycle owner; calling it
    /// again does nothing. The channel itself is left open.
    pub fn cleanup(&self) {
        self.inner.cleanup();
    }
}

impl<C: Channel> Clone for LiveSyncClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Channel> ClientInner<C> {
    fn announce_once(&self) {
        if self.torn_down.load(Ordering::SeqCst) || self.linked.swap(true, Ordering::SeqCst) {
            return;
        }
        self.announced.store(true, Ordering::SeqCst);
        self.logger.debug(
            EVENT_HANDSHAKE,
            &format!("Announcing workspace {}", self.workspace_id),
        );
        self.channel
            .emit(EVENT_HANDSHAKE, Value::String(self.workspace_id.clone()));
    }

    fn cleanup(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.logger.debug(
            EVENT_LEAVE,
            &format!("Leaving workspace {}", self.workspace_id),
        );
        self.channel
            .emit(EVENT_LEAVE, Value::String(self.workspace_id.clone()));

        let listeners = std::mem::take(&mut *lock(&self.link_listeners));
        for (event, listener) in listeners {
            self.channel.off(event, listener);
        }
    }

    async fn request(&self, event: &str, payload: Value) -> SyncResult<Value> {
        self.channel
            .emit_with_ack(event, payload, self.request_timeout)
            .await
            .map_err(|e| {
                self.logger.error(event, &format!("Request failed: {}", e));
                e
            })
    }
}

/// Listener pair installed by one `subscribe` call
struct SubscriptionListeners<C: Channel> {
    channel: Weak<C>,
    update: ListenerId,
    disconnect: OnceLock<ListenerId>,
    active: Arc<AtomicBool>,
}

impl<C: Channel> SubscriptionListeners<C> {
    fn detach(&self) {
        self.active.store(false, Ordering::SeqCst);
        let Some(channel) = self.channel.upgrade() else {
            return;
        };
        channel.off(EVENT_SERVER_UPDATES, self.update);
        if let Some(disconnect) = self.disconnect.get() {
            channel.off(EVENT_DISCONNECT, *disconnect);
        }
    }
}

/// Decode a broadcast and hand each update to the subscriber
fn deliver_updates(
    workspace_id: &str,
    logger: &dyn SyncLogger,
    payload: &Value,
    on_update: &dyn Fn(&str, Vec<u8>),
) {
    let broadcast = match ServerUpdates::deserialize(payload) {
        Ok(broadcast) => broadcast,
        Err(e) => {
            logger.error(EVENT_SERVER_UPDATES, &format!("Malformed broadcast: {}", e));
            return;
        }
    };

    if broadcast.workspace_id != workspace_id {
        return;
    }

    logger.debug(
        EVENT_SERVER_UPDATES,
        &format!(
            "Received {} update(s) for {}",
            broadcast.updates.len(),
            broadcast.guid
        ),
    );
    for update in &broadcast.updates {
        match codec::decode(update) {
            Ok(bytes) => on_update(&broadcast.guid, bytes),
            Err(e) => logger.error(
                EVENT_SERVER_UPDATES,
                &format!("Skipping undecodable update for {}: {}", broadcast.guid, e),
            ),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
