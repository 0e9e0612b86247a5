//! WebSocket channel
//!
//! Maintains a long-lived WebSocket connection carrying JSON envelopes.
//! Handles reconnection automatically with exponential backoff.
//!
//! ## Framing
//!
//! Every text frame is one envelope:
//! - event: `{"event": name, "data": payload}`
//! - request: `{"event": name, "data": payload, "ack": id}`
//! - reply: `{"ack": id, "data": reply}`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{Channel, Handler, ListenerId, ListenerRegistry, EVENT_CONNECT, EVENT_DISCONNECT};
use crate::error::{SyncError, SyncResult};

/// How long `close` waits for the connection task to flush and exit
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Configuration for the WebSocket channel
#[derive(Debug, Clone)]
pub struct WsChannelConfig {
    /// WebSocket URL
    pub url: String,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
}

impl WsChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for WsChannelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<u64>,
}

/// State shared with the connection task
#[derive(Default)]
struct Shared {
    listeners: ListenerRegistry,
    connected: AtomicBool,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route an incoming frame to its pending request or to event listeners
    fn handle_frame(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return;
            }
        };

        match (envelope.event, envelope.ack) {
            (Some(event), _) => {
                self.listeners.dispatch(&event, &envelope.data);
            }
            (None, Some(id)) => {
                let Some(reply_tx) = self.pending().remove(&id) else {
                    debug!(ack = id, "Reply for a request that already timed out");
                    return;
                };
                let _ = reply_tx.send(envelope.data);
            }
            (None, None) => debug!("Ignoring frame without event or ack"),
        }
    }
}

/// Why a connected session ended
enum SessionEnd {
    /// Connection lost; carries the disconnect reason
    Lost(&'static str),
    /// The channel was closed or dropped
    Shutdown,
}

/// Reconnecting WebSocket implementation of [`Channel`]
pub struct WsChannel {
    config: WsChannelConfig,
    shared: Arc<Shared>,
    next_ack: AtomicU64,
    outgoing_tx: mpsc::UnboundedSender<String>,
    outgoing_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsChannel {
    /// Create a channel; nothing is dialed until [`Channel::connect`]
    pub fn new(config: WsChannelConfig) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            shared: Arc::new(Shared::default()),
            next_ack: AtomicU64::new(1),
            outgoing_tx,
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Get the WebSocket URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Stop reconnecting, flush queued frames and close the socket
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                warn!("WebSocket task did not stop within {:?}", CLOSE_GRACE);
            }
        }
    }

    fn send_envelope(&self, envelope: &Envelope) -> SyncResult<()> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| SyncError::Transport(format!("Failed to encode frame: {}", e)))?;
        self.outgoing_tx
            .send(text)
            .map_err(|_| SyncError::Transport("WebSocket channel is closed".to_string()))
    }
}

impl Channel for WsChannel {
    fn emit(&self, event: &str, payload: Value) {
        let envelope = Envelope {
            event: Some(event.to_string()),
            data: payload,
            ack: None,
        };
        if let Err(e) = self.send_envelope(&envelope) {
            debug!(event, "Dropping event: {}", e);
        }
    }

    async fn emit_with_ack(
        &self,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> SyncResult<Value> {
        let id = self.next_ack.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending().insert(id, reply_tx);

        let envelope = Envelope {
            event: Some(event.to_string()),
            data: payload,
            ack: Some(id),
        };
        if let Err(e) = self.send_envelope(&envelope) {
            self.shared.pending().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(SyncError::Transport(
                "Channel closed before the reply arrived".to_string(),
            )),
            Err(_) => {
                self.shared.pending().remove(&id);
                Err(SyncError::Timeout(timeout))
            }
        }
    }

    fn on(&self, event: &str, handler: Handler) -> ListenerId {
        self.shared.listeners.add(event, handler)
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.shared.listeners.remove(event, id);
    }

    fn connect(&self) {
        let mut outgoing_rx = self.outgoing_rx.lock().unwrap_or_else(PoisonError::into_inner);
        if outgoing_rx.is_none() {
            // Connection task already running
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot start WebSocket task outside a Tokio runtime: {}", e);
                return;
            }
        };

        let Some(rx) = outgoing_rx.take() else {
            return;
        };
        let task = runtime.spawn(connection_loop(
            self.config.clone(),
            Arc::clone(&self.shared),
            rx,
            self.shutdown_tx.subscribe(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Main connection loop with reconnection
async fn connection_loop(
    config: WsChannelConfig,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reconnect_delay = config.initial_reconnect_delay;

    loop {
        if *shutdown.borrow() {
            break;
        }

        debug!("Connecting to {}", config.url);
        let connected = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok((stream, _response)) => {
                // Connection closed normally or was lost, reset backoff
                reconnect_delay = config.initial_reconnect_delay;

                shared.connected.store(true, Ordering::SeqCst);
                info!("Connected to {}", config.url);
                shared.listeners.dispatch(EVENT_CONNECT, &Value::Null);

                let end = run_session(stream, &shared, &mut outgoing, &mut shutdown).await;

                shared.connected.store(false, Ordering::SeqCst);
                let reason = match end {
                    SessionEnd::Lost(reason) => reason,
                    SessionEnd::Shutdown => "io client disconnect",
                };
                info!(reason, "Disconnected from {}", config.url);
                shared
                    .listeners
                    .dispatch(EVENT_DISCONNECT, &Value::String(reason.to_string()));

                if matches!(end, SessionEnd::Shutdown) {
                    break;
                }
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", config.url, e);
            }
        }

        // Wait before reconnecting, but check for shutdown
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {
                // Exponential backoff
                reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
            }
            _ = shutdown.changed() => break,
        }
    }

    debug!("WebSocket task for {} stopped", config.url);
}

/// Pump frames until the connection drops or the channel shuts down
async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    shared: &Shared,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            warn!("WebSocket send failed: {}", e);
                            return SessionEnd::Lost(disconnect_reason(&e));
                        }
                    }
                    None => {
                        write.close().await.ok();
                        return SessionEnd::Shutdown;
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => shared.handle_frame(&text),
                    Some(Ok(Message::Close(_))) => return SessionEnd::Lost("io server disconnect"),
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return SessionEnd::Lost(disconnect_reason(&e));
                    }
                    None => return SessionEnd::Lost("transport close"),
                    _ => {}
                }
            }

            _ = shutdown.changed() => {
                // Flush what was queued before the shutdown request
                while let Ok(text) = outgoing.try_recv() {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                write.close().await.ok();
                return SessionEnd::Shutdown;
            }
        }
    }
}

/// Classify a socket error as a plain close or a transport failure
fn disconnect_reason(error: &WsError) -> &'static str {
    match error {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => "transport close",
        _ => "transport error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config(url: String) -> WsChannelConfig {
        WsChannelConfig {
            url,
            initial_reconnect_delay: Duration::from_millis(20),
            max_reconnect_delay: Duration::from_millis(100),
        }
    }

    /// Forward connect/disconnect events into a queue
    fn record_lifecycle(channel: &WsChannel) -> mpsc::UnboundedReceiver<(String, Value)> {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in [EVENT_CONNECT, EVENT_DISCONNECT] {
            let tx = tx.clone();
            channel.on(
                event,
                Arc::new(move |payload: &Value| {
                    let _ = tx.send((event.to_string(), payload.clone()));
                }),
            );
        }
        rx
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<(String, Value)>) -> (String, Value) {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("no channel event in time")
            .expect("event queue closed")
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("client did not dial in time")
            .unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn next_envelope(server: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            let frame = tokio::time::timeout(WAIT, server.next())
                .await
                .expect("no frame in time");
            match frame {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = WsChannelConfig::default();
        assert_eq!(config.initial_reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_envelope_encoding() {
        let envelope = Envelope {
            event: Some("client-handshake-sync".to_string()),
            data: json!("ws-1"),
            ack: None,
        };
        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(text, r#"{"event":"client-handshake-sync","data":"ws-1"}"#);
    }

    #[test]
    fn test_reply_frame_resolves_pending_request() {
        let shared = Shared::default();
        let (reply_tx, mut reply_rx) = oneshot::channel();
        shared.pending().insert(7, reply_tx);

        shared.handle_frame(r#"{"ack":7,"data":{"data":{"missing":""}}}"#);

        let reply = reply_rx.try_recv().unwrap();
        assert_eq!(reply["data"]["missing"], "");
        assert!(shared.pending().is_empty());
    }

    #[test]
    fn test_event_frame_dispatches_to_listeners() {
        let shared = Shared::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        shared.listeners.add(
            "server-updates",
            Arc::new(move |payload: &Value| {
                assert_eq!(payload["guid"], "doc-1");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        shared.handle_frame(r#"{"event":"server-updates","data":{"guid":"doc-1"}}"#);
        shared.handle_frame("not json");

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out_while_never_connected() {
        let channel = WsChannel::new(WsChannelConfig::new("ws://127.0.0.1:9"));

        let result = channel
            .emit_with_ack("doc-load-v2", Value::Null, Duration::from_secs(30))
            .await;

        assert!(matches!(result, Err(SyncError::Timeout(_))));
        assert!(channel.shared.pending().is_empty());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_disconnect_reason_classification() {
        assert_eq!(disconnect_reason(&WsError::ConnectionClosed), "transport close");
        assert_eq!(
            disconnect_reason(&WsError::Protocol(
                ProtocolError::ResetWithoutClosingHandshake
            )),
            "transport close"
        );
        assert_eq!(
            disconnect_reason(&WsError::Protocol(ProtocolError::HandshakeIncomplete)),
            "transport error"
        );
    }

    #[tokio::test]
    async fn test_reply_round_trip_then_reconnect_flushes_queued_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let channel = Arc::new(WsChannel::new(fast_config(url)));
        let mut events = record_lifecycle(&channel);
        channel.connect();

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut events).await, (EVENT_CONNECT.to_string(), Value::Null));
        assert!(channel.is_connected());

        let requester = Arc::clone(&channel);
        let request = tokio::spawn(async move {
            requester
                .emit_with_ack("doc-load-v2", json!({"guid": "doc-1"}), WAIT)
                .await
        });
        let frame = next_envelope(&mut server).await;
        assert_eq!(frame["event"], "doc-load-v2");
        assert_eq!(frame["data"]["guid"], "doc-1");
        let ack = frame["ack"].as_u64().unwrap();
        server
            .send(Message::Text(json!({"ack": ack, "data": {"ok": 1}}).to_string()))
            .await
            .unwrap();
        assert_eq!(request.await.unwrap().unwrap(), json!({"ok": 1}));

        // Drop the socket without a close frame
        drop(server);
        assert_eq!(
            next_event(&mut events).await,
            (EVENT_DISCONNECT.to_string(), json!("transport close"))
        );

        channel.emit("client-update-v2", json!({"guid": "doc-1"}));

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut events).await.0, EVENT_CONNECT);
        let frame = next_envelope(&mut server).await;
        assert_eq!(frame["event"], "client-update-v2");
        assert!(frame.get("ack").is_none());
        assert!(channel.is_connected());

        channel.close().await;
    }

    #[tokio::test]
    async fn test_backoff_retries_until_server_is_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = WsChannel::new(fast_config(format!("ws://{}", addr)));
        let mut events = record_lifecycle(&channel);
        channel.connect();
        channel.emit("client-handshake-sync", json!("ws-1"));

        // Let a few dial attempts fail
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!channel.is_connected());

        let listener = TcpListener::bind(addr).await.unwrap();
        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut events).await.0, EVENT_CONNECT);

        let frame = next_envelope(&mut server).await;
        assert_eq!(frame["event"], "client-handshake-sync");
        assert_eq!(frame["data"], "ws-1");

        channel.close().await;
    }

    #[tokio::test]
    async fn test_close_flushes_queued_frames_and_stops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let channel = WsChannel::new(fast_config(url));
        let mut events = record_lifecycle(&channel);
        channel.connect();

        let mut server = accept(&listener).await;
        assert_eq!(next_event(&mut events).await.0, EVENT_CONNECT);

        channel.emit("client-leave-sync", json!("ws-1"));
        channel.close().await;

        let frame = next_envelope(&mut server).await;
        assert_eq!(frame["event"], "client-leave-sync");
        assert_eq!(
            next_event(&mut events).await,
            (EVENT_DISCONNECT.to_string(), json!("io client disconnect"))
        );
        assert!(!channel.is_connected());

        // No reconnect after close
        let redial = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(redial.is_err());
    }
}
