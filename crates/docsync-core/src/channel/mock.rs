//! In-memory channel for tests
//!
//! Records everything the clients send, answers requests from scripted
//! replies and lets tests drive the connect/disconnect lifecycle by hand.
//! Requests with no scripted reply are never acknowledged and time out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use super::{Channel, Handler, ListenerId, ListenerRegistry, EVENT_CONNECT, EVENT_DISCONNECT};
use crate::error::{SyncError, SyncResult};

/// Scripted channel double
#[derive(Debug, Default)]
pub struct MockChannel {
    listeners: ListenerRegistry,
    connected: AtomicBool,
    connect_requests: AtomicUsize,
    emitted: Mutex<Vec<(String, Value)>>,
    requests: Mutex<Vec<(String, Value)>>,
    replies: Mutex<HashMap<String, Value>>,
}

impl MockChannel {
    /// Create a disconnected mock channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock channel that reports itself connected
    pub fn connected() -> Self {
        let channel = Self::new();
        channel.connected.store(true, Ordering::SeqCst);
        channel
    }

    /// Answer every request for `event` with `reply`
    pub fn set_reply(&self, event: &str, reply: Value) {
        lock(&self.replies).insert(event.to_string(), reply);
    }

    /// Stop answering requests for `event`
    pub fn clear_reply(&self, event: &str) {
        lock(&self.replies).remove(event);
    }

    /// Fire-and-forget events emitted so far
    pub fn emitted(&self) -> Vec<(String, Value)> {
        lock(&self.emitted).clone()
    }

    /// Number of fire-and-forget emissions of one event
    pub fn emitted_count(&self, event: &str) -> usize {
        lock(&self.emitted)
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    /// Acknowledged requests sent so far
    pub fn requests(&self) -> Vec<(String, Value)> {
        lock(&self.requests).clone()
    }

    /// How often [`Channel::connect`] was called
    pub fn connect_requests(&self) -> usize {
        self.connect_requests.load(Ordering::SeqCst)
    }

    /// Number of handlers installed for an event
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }

    /// Mark the channel connected and fire the connect event
    pub fn simulate_connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.listeners.dispatch(EVENT_CONNECT, &Value::Null);
    }

    /// Mark the channel disconnected and fire the disconnect event
    pub fn simulate_disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.listeners
            .dispatch(EVENT_DISCONNECT, &Value::String(reason.to_string()));
    }

    /// Deliver a server-originated event to the installed handlers
    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        self.listeners.dispatch(event, &payload)
    }
}

impl Channel for MockChannel {
    fn emit(&self, event: &str, payload: Value) {
        lock(&self.emitted).push((event.to_string(), payload));
    }

    async fn emit_with_ack(
        &self,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> SyncResult<Value> {
        lock(&self.requests).push((event.to_string(), payload));

        let reply = lock(&self.replies).get(event).cloned();
        match reply {
            Some(reply) => Ok(reply),
            None => {
                tokio::time::sleep(timeout).await;
                Err(SyncError::Timeout(timeout))
            }
        }
    }

    fn on(&self, event: &str, handler: Handler) -> ListenerId {
        self.listeners.add(event, handler)
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.listeners.remove(event, id);
    }

    fn connect(&self) {
        self.connect_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
