//! WebSocket server that every tab connects to.
//!
//! One coordinator serves an unbounded number of tab connections on a
//! single port, all sharing one [`Dispatcher`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐                ┌─────────────────────────────────┐
//! │  Tab A   │◄──────────────►│           Coordinator           │
//! └──────────┘   WebSocket    │  ┌───────────────────────────┐  │
//! ┌──────────┐                │  │ ConnectionId=1 → session  │  │
//! │  Tab B   │◄──────────────►│  │ ConnectionId=2 → session  │  │
//! └──────────┘                │  └─────────────┬─────────────┘  │
//!                             │                ▼                │
//!                             │   Dispatcher → Registry         │
//!                             └─────────────────────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. TCP accept and WebSocket upgrade
//! 2. `welcome` sent, session is active
//! 3. One response envelope per inbound text frame
//! 4. Session ends on close, socket error or coordinator shutdown

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::{CoordinatorMessage, Envelope, WelcomePayload};

use super::config::CoordinatorConfig;
use super::dispatch::Dispatcher;

// ============================================================================
// Constants
// ============================================================================

/// Interval at which the accept loop checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Coordinator
// ============================================================================

/// The singleton coordinator.
///
/// # Example
///
/// ```ignore
/// let coordinator = Coordinator::bind(CoordinatorConfig::new()).await?;
/// println!("Coordinator at {}", coordinator.ws_url());
///
/// // Tabs connect to ws_url ...
///
/// coordinator.shutdown().await;
/// ```
pub struct Coordinator {
    /// Bound address.
    addr: SocketAddr,

    /// Largest text frame dispatched.
    max_message_size: usize,

    /// Registry owner shared by all sessions.
    dispatcher: Arc<Dispatcher>,

    /// Shutdown signals of live sessions.
    sessions: RwLock<FxHashMap<ConnectionId, oneshot::Sender<()>>>,

    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// Coordinator - Constructor
// ============================================================================

impl Coordinator {
    /// Starts a coordinator on `127.0.0.1` with a random port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn new() -> Result<Arc<Self>> {
        Self::bind(CoordinatorConfig::new()).await
    }

    /// Binds the listener and starts the accept loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Io`] if binding fails
    pub async fn bind(config: CoordinatorConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let listener = TcpListener::bind(config.socket_addr()).await?;
        let addr = listener.local_addr()?;

        debug!(%addr, "Coordinator WebSocket server bound");

        let coordinator = Arc::new(Self {
            addr,
            max_message_size: config.max_message_size,
            dispatcher: Arc::new(Dispatcher::new()),
            sessions: RwLock::new(FxHashMap::default()),
            shutdown: AtomicBool::new(false),
        });

        let coordinator_clone = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator_clone.accept_loop(listener).await;
        });

        info!(port = addr.port(), "Coordinator started");

        Ok(coordinator)
    }
}

// ============================================================================
// Coordinator - Public API
// ============================================================================

impl Coordinator {
    /// Returns the WebSocket URL tabs connect to.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the number of active tab sessions.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns the dispatcher for in-process diagnostics.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Stops accepting connections and closes every session.
    ///
    /// The registry is not persisted.
    pub async fn shutdown(&self) {
        info!("Coordinator shutting down");

        self.shutdown.store(true, Ordering::SeqCst);

        let sessions: Vec<_> = {
            let mut map = self.sessions.write();
            map.drain().collect()
        };

        for (connection_id, stop_tx) in sessions {
            let _ = stop_tx.send(());
            debug!(%connection_id, "Session closed during shutdown");
        }

        info!("Coordinator shutdown complete");
    }
}

// ============================================================================
// Coordinator - Accept Loop
// ============================================================================

impl Coordinator {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = coordinator.run_session(stream, addr).await {
                            warn!(error = %e, ?addr, "Session failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Serves a single tab connection until it closes.
    async fn run_session(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let connection_id = ConnectionId::next();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        if !self.register_session(connection_id, stop_tx) {
            debug!(%connection_id, ?addr, "Session refused during shutdown");
            let _ = ws_write.close().await;
            return Ok(());
        }

        let welcome = CoordinatorMessage::Welcome(WelcomePayload {
            connection_id: Some(connection_id),
        })
        .to_envelope()
        .to_json()?;

        if let Err(e) = ws_write.send(Message::Text(welcome.into())).await {
            self.sessions.write().remove(&connection_id);
            return Err(e.into());
        }

        info!(%connection_id, ?addr, "Session active");

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let response = self.respond(connection_id, &text);
                            let json = match response.to_json() {
                                Ok(json) => json,
                                Err(e) => {
                                    error!(%connection_id, error = %e, "Failed to encode response");
                                    continue;
                                }
                            };

                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                warn!(%connection_id, error = %e, "Failed to send response");
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(%connection_id, "WebSocket closed by tab");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(%connection_id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(%connection_id, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                _ = &mut stop_rx => {
                    let _ = ws_write.close().await;
                    break;
                }
            }
        }

        self.sessions.write().remove(&connection_id);
        info!(%connection_id, "Session ended");

        Ok(())
    }

    /// Adds a session so [`shutdown`](Self::shutdown) can close it.
    ///
    /// Returns `false` once shutdown has started; the session must end.
    fn register_session(
        &self,
        connection_id: ConnectionId,
        stop_tx: oneshot::Sender<()>,
    ) -> bool {
        self.sessions.write().insert(connection_id, stop_tx);

        // The flag is set before shutdown drains, so a session inserted after
        // the drain always observes it here.
        if self.shutdown.load(Ordering::SeqCst) {
            self.sessions.write().remove(&connection_id);
            return false;
        }
        true
    }

    /// Produces the response to one inbound text frame.
    fn respond(&self, connection_id: ConnectionId, text: &str) -> Envelope {
        if text.len() > self.max_message_size {
            warn!(
                %connection_id,
                size = text.len(),
                max = self.max_message_size,
                "Message too large"
            );
            let error = Error::message_too_large(text.len(), self.max_message_size);
            return Dispatcher::reject_text(text, &error);
        }

        trace!(%connection_id, "Dispatching message");
        self.dispatcher.dispatch_text(text)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_tungstenite::connect_async;

    use crate::protocol::{ClientMessage, MessageType};
    use crate::subscription::SubscriptionRequest;

    async fn next_envelope<S>(read: &mut S) -> Envelope
    where
        S: futures_util::Stream<
                Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
            > + Unpin,
    {
        loop {
            match read.next().await.expect("stream open").expect("frame") {
                Message::Text(text) => return Envelope::from_json(&text).expect("envelope"),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_coordinator_binds_random_port() {
        let coordinator = Coordinator::new().await.expect("bind");
        assert!(coordinator.port() > 0);
        assert_eq!(
            coordinator.ws_url(),
            format!("ws://127.0.0.1:{}", coordinator.port())
        );
        assert_eq!(coordinator.connection_count(), 0);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = Coordinator::bind(CoordinatorConfig::new().with_max_message_size(0)).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_session_sends_welcome_then_responses() {
        let coordinator = Coordinator::new().await.expect("bind");
        let (ws, _) = connect_async(coordinator.ws_url()).await.expect("connect");
        let (mut write, mut read) = ws.split();

        let welcome = next_envelope(&mut read).await;
        assert_eq!(welcome.kind().expect("kind"), MessageType::Welcome);
        assert!(welcome.data["connectionId"].is_u64());

        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .build()
            .expect("build");
        let json = ClientMessage::RegisterSubscription(request)
            .to_envelope()
            .and_then(|e| e.to_json())
            .expect("json");
        write.send(Message::Text(json.into())).await.expect("send");

        let response = next_envelope(&mut read).await;
        assert_eq!(response.message_type, "SUBSCRIPTION_REGISTERED");
        assert_eq!(coordinator.dispatcher().subscription_count(), 1);
        assert_eq!(coordinator.connection_count(), 1);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_type_keeps_session_alive() {
        let coordinator = Coordinator::new().await.expect("bind");
        let (ws, _) = connect_async(coordinator.ws_url()).await.expect("connect");
        let (mut write, mut read) = ws.split();
        next_envelope(&mut read).await;

        write
            .send(Message::Text(r#"{"type":"NOPE","data":null}"#.into()))
            .await
            .expect("send");
        let error = next_envelope(&mut read).await;
        assert_eq!(error.message_type, "ERROR");

        write
            .send(Message::Text(r#"{"type":"GET_SUBSCRIPTION_COUNT"}"#.into()))
            .await
            .expect("send");
        let count = next_envelope(&mut read).await;
        assert_eq!(count.data, json!({ "count": 0 }));

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_message_replies_error() {
        let coordinator = Coordinator::bind(CoordinatorConfig::new().with_max_message_size(16))
            .await
            .expect("bind");
        let (ws, _) = connect_async(coordinator.ws_url()).await.expect("connect");
        let (mut write, mut read) = ws.split();
        next_envelope(&mut read).await;

        write
            .send(Message::Text(r#"{"type":"GET_ALL_SUBSCRIPTIONS"}"#.into()))
            .await
            .expect("send");
        let error = next_envelope(&mut read).await;
        assert_eq!(error.message_type, "ERROR");
        assert!(
            error.data["error"]
                .as_str()
                .expect("error")
                .starts_with("Message too large")
        );

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_register_replies_subscription_error() {
        let coordinator = Coordinator::bind(CoordinatorConfig::new().with_max_message_size(200))
            .await
            .expect("bind");
        let (ws, _) = connect_async(coordinator.ws_url()).await.expect("connect");
        let (mut write, mut read) = ws.split();
        next_envelope(&mut read).await;

        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_big")
            .param("blob", "x".repeat(500))
            .build()
            .expect("build");
        let json = ClientMessage::RegisterSubscription(request)
            .to_envelope()
            .and_then(|e| e.to_json())
            .expect("json");
        write.send(Message::Text(json.into())).await.expect("send");

        let response = next_envelope(&mut read).await;
        assert_eq!(response.message_type, "SUBSCRIPTION_ERROR");
        assert_eq!(response.data["subscriptionId"], json!("sub_big"));
        assert_eq!(coordinator.dispatcher().subscription_count(), 0);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_registered_after_shutdown_is_refused() {
        let coordinator = Coordinator::new().await.expect("bind");
        coordinator.shutdown().await;

        let (stop_tx, _stop_rx) = oneshot::channel();
        assert!(!coordinator.register_session(ConnectionId::next(), stop_tx));
        assert_eq!(coordinator.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_session_registered_before_shutdown_is_tracked() {
        let coordinator = Coordinator::new().await.expect("bind");

        let (stop_tx, stop_rx) = oneshot::channel();
        assert!(coordinator.register_session(ConnectionId::next(), stop_tx));
        assert_eq!(coordinator.connection_count(), 1);

        coordinator.shutdown().await;
        assert_eq!(coordinator.connection_count(), 0);
        assert!(stop_rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let coordinator = Coordinator::new().await.expect("bind");
        let (ws, _) = connect_async(coordinator.ws_url()).await.expect("connect");
        let (_write, mut read) = ws.split();
        next_envelope(&mut read).await;

        coordinator.shutdown().await;
        assert_eq!(coordinator.connection_count(), 0);

        let ended = timeout(Duration::from_secs(5), async {
            while let Some(Ok(message)) = read.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(ended.is_ok());
    }
}
