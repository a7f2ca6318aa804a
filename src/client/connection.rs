//! Per-tab connection to the coordinator.
//!
//! A [`ConnectionManager`] hides connection setup, buffering and response
//! correlation behind a request/response call.
//!
//! # Event Loop
//!
//! [`ConnectionManager::connect`] spawns a tokio task that:
//!
//! - Opens the WebSocket and waits for `welcome`
//! - Flushes requests buffered while connecting, in issue order, exactly once
//! - Writes requests issued after the connection is up
//! - Matches responses to pending requests by type family
//! - Moves the manager to `error` on any transport failure
//!
//! # Behavior by Status
//!
//! | Status | `send_message` |
//! |--------|----------------|
//! | `connecting` | buffered until `welcome` |
//! | `connected` | written immediately |
//! | `disconnected` | rejected with [`Error::NotConnected`] |
//! | `error` | rejected with [`Error::TransportFailed`] |

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{AppId, ListenerId, MessageId, SubscriptionId};
use crate::protocol::{
    ClientMessage, CoordinatorMessage, Envelope, SubscriptionIdPayload, WelcomePayload,
};
use crate::subscription::{ActiveSubscription, SubscriptionRequest, SubscriptionRequestBuilder};

use super::options::ConnectionOptions;
use super::pending::{OutboundMessage, PendingRequests};
use super::status::{ConnectionStatus, StatusListeners};

// ============================================================================
// Types
// ============================================================================

/// Write half of the coordinator WebSocket.
type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Internal commands for the event loop.
enum LoopCommand {
    /// Write an envelope.
    Send(OutboundMessage),
    /// Close the socket and stop.
    Shutdown,
}

/// Mutable client-side state, guarded by one lock.
struct ManagerState {
    status: ConnectionStatus,
    /// Reason recorded when the transport failed.
    failure: Option<String>,
    /// Envelopes issued while connecting.
    buffer: VecDeque<OutboundMessage>,
    pending: PendingRequests,
}

/// State shared between the manager handles and the event loop.
struct Shared {
    state: Mutex<ManagerState>,
    status_tx: watch::Sender<ConnectionStatus>,
    listeners: StatusListeners,
}

impl Shared {
    /// Sets the status while the state lock is held.
    ///
    /// Returns `true` if it changed; the caller then runs [`Shared::notify`]
    /// after releasing the lock.
    fn transition(&self, state: &mut ManagerState, status: ConnectionStatus) -> bool {
        if state.status == status {
            return false;
        }
        debug!(from = %state.status, to = %status, "Connection status changed");
        state.status = status;
        self.status_tx.send_replace(status);
        true
    }

    /// Runs status listeners.
    fn notify(&self, status: ConnectionStatus) {
        self.listeners.notify(status);
    }

    /// Records a transport failure and fails all outstanding work.
    ///
    /// Ignored after an explicit disconnect.
    fn fail(&self, reason: String) {
        let (pending, dropped) = {
            let mut state = self.state.lock();
            if matches!(
                state.status,
                ConnectionStatus::Disconnected | ConnectionStatus::Error
            ) {
                return;
            }
            self.transition(&mut state, ConnectionStatus::Error);
            state.failure = Some(reason.clone());
            let dropped = state.buffer.len();
            state.buffer.clear();
            (state.pending.take_all(), dropped)
        };

        error!(
            reason = %reason,
            pending = pending.len(),
            buffered = dropped,
            "Coordinator transport failed"
        );

        for request in pending {
            request.reject(Error::ConnectionClosed);
        }

        self.notify(ConnectionStatus::Error);
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// A tab's handle to the coordinator.
///
/// Cloning is cheap; clones share the same connection. Use a
/// [`ConnectionRegistry`](super::ConnectionRegistry) to keep exactly one per
/// endpoint.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::connect("ws://127.0.0.1:7400", ConnectionOptions::new())?;
///
/// let request = manager
///     .create_subscription_request("query", "p1", "production")
///     .param("type", "book")
///     .build()?;
/// let registered = manager.register_subscription(request).await?;
///
/// manager.unregister_subscription(&registered.subscription_id).await?;
/// manager.disconnect();
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    endpoint: Url,
    options: ConnectionOptions,
    shared: Arc<Shared>,
    command_tx: mpsc::UnboundedSender<LoopCommand>,
}

// ============================================================================
// ConnectionManager - Display
// ============================================================================

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint.as_str())
            .field("status", &self.status())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Constructor
// ============================================================================

impl ConnectionManager {
    /// Starts connecting to the coordinator at `endpoint`.
    ///
    /// Returns immediately in the `connecting` state. Requests issued now
    /// are buffered until the coordinator's `welcome` arrives.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `endpoint` is not a URL
    /// - [`Error::Config`] if the scheme is not `ws`/`wss` or the options are invalid
    pub fn connect(endpoint: &str, options: ConnectionOptions) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        options.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);

        let shared = Arc::new(Shared {
            state: Mutex::new(ManagerState {
                status: ConnectionStatus::Connecting,
                failure: None,
                buffer: VecDeque::new(),
                pending: PendingRequests::default(),
            }),
            status_tx,
            listeners: StatusListeners::default(),
        });

        info!(endpoint = %endpoint, app_id = %options.app_id, "Connecting to coordinator");

        tokio::spawn(Self::run_event_loop(
            endpoint.clone(),
            options.connect_timeout,
            command_rx,
            Arc::clone(&shared),
        ));

        Ok(Self {
            endpoint,
            options,
            shared,
            command_tx,
        })
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the coordinator endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the options this manager was created with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns the application ID of this tab.
    #[inline]
    #[must_use]
    pub fn app_id(&self) -> &AppId {
        &self.options.app_id
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Returns the number of requests buffered while connecting.
    #[inline]
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Returns `true` if both handles share one connection.
    #[inline]
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

// ============================================================================
// ConnectionManager - Status
// ============================================================================

impl ConnectionManager {
    /// Registers a callback for status transitions.
    pub fn subscribe_status<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(Arc::new(listener))
    }

    /// Removes a status callback. Returns `true` if it was registered.
    pub fn unsubscribe_status(&self, id: ListenerId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    /// Waits until the manager reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if `target` is not reached in time.
    pub async fn wait_for_status(
        &self,
        target: ConnectionStatus,
        wait: Duration,
    ) -> Result<()> {
        let mut status_rx = self.shared.status_tx.subscribe();
        match timeout(wait, status_rx.wait_for(|status| *status == target)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::connection_timeout(wait.as_millis() as u64)),
        }
    }

    /// Closes the connection and abandons all buffered and pending requests.
    ///
    /// The coordinator is not notified. Callers still waiting receive
    /// [`Error::ConnectionClosed`]; later calls fail with
    /// [`Error::NotConnected`].
    pub fn disconnect(&self) {
        let abandoned = {
            let mut state = self.shared.state.lock();
            if !self
                .shared
                .transition(&mut state, ConnectionStatus::Disconnected)
            {
                return;
            }
            state.failure = None;
            state.buffer.clear();
            state.pending.take_all()
        };

        let _ = self.command_tx.send(LoopCommand::Shutdown);

        info!(
            endpoint = %self.endpoint,
            abandoned = abandoned.len(),
            "Disconnected from coordinator"
        );
        drop(abandoned);

        self.shared.notify(ConnectionStatus::Disconnected);
    }
}

// ============================================================================
// ConnectionManager - Messaging
// ============================================================================

impl ConnectionManager {
    /// Sends a request and waits for the response that answers it.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] after [`disconnect`](Self::disconnect)
    /// - [`Error::TransportFailed`] after a transport failure
    /// - [`Error::Protocol`] if too many requests are pending
    /// - [`Error::RequestTimeout`] if no response matched in time
    /// - [`Error::ConnectionClosed`] if the connection ended while waiting
    pub async fn send_message(&self, message: ClientMessage) -> Result<CoordinatorMessage> {
        let request_type = message.message_type();
        let message_id = MessageId::generate(request_type.as_str());
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();

        {
            let mut state = self.shared.state.lock();

            if !state.status.accepts_requests() {
                return Err(Self::rejection(&state));
            }

            if state.pending.len() >= self.options.max_pending_requests {
                warn!(
                    pending = state.pending.len(),
                    max = self.options.max_pending_requests,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    state.pending.len(),
                    self.options.max_pending_requests
                )));
            }

            let outbound = OutboundMessage {
                message_id: message_id.clone(),
                payload: message.to_envelope()?.to_json()?,
            };
            state
                .pending
                .push(message_id.clone(), request_type, response_tx);

            if state.status == ConnectionStatus::Connecting {
                state.buffer.push_back(outbound);
                trace!(%message_id, buffered = state.buffer.len(), "Request buffered");
            } else if self.command_tx.send(LoopCommand::Send(outbound)).is_err() {
                state.pending.remove(&message_id);
                return Err(Error::ConnectionClosed);
            }
        }

        match timeout(self.options.request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                {
                    let mut state = self.shared.state.lock();
                    state.pending.remove(&message_id);
                    state.buffer.retain(|m| m.message_id != message_id);
                }

                warn!(%message_id, "Request timed out");

                Err(Error::request_timeout(
                    message_id,
                    self.options.request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Error for a request issued in a state that does not accept requests.
    fn rejection(state: &ManagerState) -> Error {
        match state.status {
            ConnectionStatus::Error => Error::transport_failed(
                state
                    .failure
                    .clone()
                    .unwrap_or_else(|| "unknown transport failure".to_string()),
            ),
            _ => Error::NotConnected,
        }
    }

    /// Starts a request builder stamped with this tab's [`AppId`].
    #[must_use]
    pub fn create_subscription_request(
        &self,
        store_name: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> SubscriptionRequestBuilder {
        SubscriptionRequest::builder(store_name, project_id, dataset)
            .app_id(self.options.app_id.clone())
    }

    /// Registers a subscription, or joins an equivalent one.
    ///
    /// The returned ID may belong to a subscription registered earlier by
    /// another tab.
    ///
    /// # Errors
    ///
    /// - [`Error::Subscription`] if the coordinator rejected the request
    /// - [`Error::UnexpectedResponse`] for any other response type
    /// - any error of [`send_message`](Self::send_message)
    pub async fn register_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> Result<SubscriptionIdPayload> {
        match self
            .send_message(ClientMessage::RegisterSubscription(request))
            .await?
        {
            CoordinatorMessage::SubscriptionRegistered(payload) => {
                debug!(subscription_id = %payload.subscription_id, "Subscription registered");
                Ok(payload)
            }
            CoordinatorMessage::SubscriptionError(payload) => {
                Err(Error::subscription(payload.error))
            }
            other => Err(Error::unexpected_response(other.message_type().as_str())),
        }
    }

    /// Unregisters a subscription.
    ///
    /// # Errors
    ///
    /// - [`Error::Subscription`] if the coordinator rejected the request
    /// - [`Error::UnexpectedResponse`] for any other response type
    /// - any error of [`send_message`](Self::send_message)
    pub async fn unregister_subscription(&self, subscription_id: &SubscriptionId) -> Result<()> {
        match self
            .send_message(ClientMessage::unregister(subscription_id.clone()))
            .await?
        {
            CoordinatorMessage::SubscriptionUnregistered(_) => Ok(()),
            CoordinatorMessage::SubscriptionError(payload) => {
                Err(Error::subscription(payload.error))
            }
            other => Err(Error::unexpected_response(other.message_type().as_str())),
        }
    }

    /// Returns the coordinator's active subscription count.
    ///
    /// # Errors
    ///
    /// - [`Error::Coordinator`] if the coordinator answered `ERROR`
    /// - [`Error::UnexpectedResponse`] for any other response type
    pub async fn subscription_count(&self) -> Result<usize> {
        match self.send_message(ClientMessage::GetSubscriptionCount).await? {
            CoordinatorMessage::SubscriptionCount(payload) => Ok(payload.count),
            CoordinatorMessage::Error(payload) => Err(Error::coordinator(payload.error)),
            other => Err(Error::unexpected_response(other.message_type().as_str())),
        }
    }

    /// Returns a snapshot of the coordinator's active subscriptions.
    ///
    /// # Errors
    ///
    /// - [`Error::Coordinator`] if the coordinator answered `ERROR`
    /// - [`Error::UnexpectedResponse`] for any other response type
    pub async fn all_subscriptions(&self) -> Result<Vec<ActiveSubscription>> {
        match self.send_message(ClientMessage::GetAllSubscriptions).await? {
            CoordinatorMessage::AllSubscriptions(payload) => Ok(payload.subscriptions),
            CoordinatorMessage::Error(payload) => Err(Error::coordinator(payload.error)),
            other => Err(Error::unexpected_response(other.message_type().as_str())),
        }
    }
}

// ============================================================================
// ConnectionManager - Event Loop
// ============================================================================

impl ConnectionManager {
    /// Event loop that owns the WebSocket.
    async fn run_event_loop(
        endpoint: Url,
        connect_timeout: Duration,
        mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
        shared: Arc<Shared>,
    ) {
        let connect = timeout(connect_timeout, connect_async(endpoint.as_str()));

        let ws_stream = tokio::select! {
            result = connect => match result {
                Ok(Ok((ws_stream, _))) => ws_stream,
                Ok(Err(e)) => {
                    shared.fail(format!("WebSocket connect failed: {e}"));
                    return;
                }
                Err(_) => {
                    shared.fail(format!(
                        "Connection timeout after {}ms",
                        connect_timeout.as_millis()
                    ));
                    return;
                }
            },

            // Nothing is sent before `welcome`, so only a shutdown can arrive here.
            _ = command_rx.recv() => {
                debug!("Shutdown before connection established");
                return;
            }
        };

        debug!(endpoint = %endpoint, "WebSocket connected, awaiting welcome");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let failure = loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) =
                                Self::handle_incoming_message(&text, &shared, &mut ws_write).await
                            {
                                break Some(e.to_string());
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            break Some("Connection closed by coordinator".to_string());
                        }

                        Some(Err(e)) => {
                            break Some(format!("WebSocket error: {e}"));
                        }

                        None => {
                            break Some("WebSocket stream ended".to_string());
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(LoopCommand::Send(outbound)) => {
                            let message_id = outbound.message_id;
                            if let Err(e) = ws_write.send(Message::Text(outbound.payload.into())).await {
                                break Some(format!("Failed to send {message_id}: {e}"));
                            }
                            trace!(%message_id, "Request sent");
                        }

                        Some(LoopCommand::Shutdown) | None => {
                            let _ = ws_write.close().await;
                            break None;
                        }
                    }
                }
            }
        };

        if let Some(reason) = failure {
            shared.fail(reason);
        }

        debug!(endpoint = %endpoint, "Event loop terminated");
    }

    /// Handles one text frame from the coordinator.
    ///
    /// Returns an error only when the transport failed.
    async fn handle_incoming_message(
        text: &str,
        shared: &Shared,
        ws_write: &mut WsSink,
    ) -> Result<()> {
        let message = match Envelope::from_json(text).and_then(CoordinatorMessage::try_from) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, text = %text, "Failed to parse coordinator message");
                return Ok(());
            }
        };

        if let CoordinatorMessage::Welcome(payload) = message {
            return Self::handle_welcome(payload, shared, ws_write).await;
        }

        let response_type = message.message_type();
        let matched = shared.state.lock().pending.resolve(message);
        match matched {
            Some(message_id) => trace!(%message_id, %response_type, "Response matched"),
            None => debug!(%response_type, "Dropping response with no pending request"),
        }

        Ok(())
    }

    /// Moves to `connected` and flushes the buffer in issue order.
    async fn handle_welcome(
        payload: WelcomePayload,
        shared: &Shared,
        ws_write: &mut WsSink,
    ) -> Result<()> {
        let flushed: Vec<OutboundMessage> = {
            let mut state = shared.state.lock();
            if state.status != ConnectionStatus::Connecting {
                debug!(status = %state.status, "Ignoring welcome");
                return Ok(());
            }
            shared.transition(&mut state, ConnectionStatus::Connected);
            state.buffer.drain(..).collect()
        };

        info!(
            connection_id = ?payload.connection_id,
            flushed = flushed.len(),
            "Connected to coordinator"
        );
        shared.notify(ConnectionStatus::Connected);

        for outbound in flushed {
            ws_write
                .send(Message::Text(outbound.payload.into()))
                .await
                .map_err(|e| {
                    Error::connection(format!(
                        "Failed to flush {}: {e}",
                        outbound.message_id
                    ))
                })?;
            trace!(message_id = %outbound.message_id, "Buffered request sent");
        }

        Ok(())
    }
}

// ============================================================================
// Endpoint Parsing
// ============================================================================

/// Parses and checks a coordinator endpoint URL.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(Error::config(format!(
            "Unsupported endpoint scheme '{scheme}', expected ws or wss"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
