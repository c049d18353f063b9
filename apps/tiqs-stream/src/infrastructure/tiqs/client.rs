//! Tiqs Stream Client
//!
//! Connection manager for the Tiqs tick feed. Owns the socket lifecycle,
//! restores subscriptions after every (re)connect, decodes binary frames and
//! hands ticks to the consumer through the delivery queues.
//!
//! # Stream URL
//!
//! `wss://wss.tiqs.trading?appId=<app id>&token=<session token>`
//!
//! # Protocol
//!
//! - Outbound: JSON text frames, `{"code":"sub","mode":"full","full":[...]}`
//! - Inbound: length-discriminated binary tick frames
//!
//! # Tasks
//!
//! One supervisor task per client runs the receive loop and, on a read
//! failure, reconnects in place. Subscribe, unsubscribe, connect and close
//! run on the caller's task and share only the socket writer and the
//! subscription registry with it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, FrameKind, TickCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::websocket::TungsteniteDialer;
use crate::application::ports::{Dialer, FeedSink, FeedSource, InboundFrame, TransportError};
use crate::domain::streaming::{ConnectionState, Token};
use crate::domain::subscription::{Mode, SubscriptionRegistry, SubscriptionRequest};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::delivery::{
    self, DeliveryConfig, DeliveryPublisher, FeedStream, TickStream,
};
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Every dial attempt failed.
    #[error("dial failed after {attempts} attempt(s): {source}")]
    Dial {
        /// Attempts made.
        attempts: u32,
        /// Last dial failure.
        #[source]
        source: TransportError,
    },

    /// A binary frame could not be decoded.
    #[error(transparent)]
    MalformedFrame(#[from] CodecError),

    /// Reading from the socket failed.
    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    /// Writing a control message failed.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    /// A control message could not be encoded.
    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),

    /// No live socket to send on.
    #[error("not connected")]
    NotConnected,

    /// The client has been closed.
    #[error("client closed")]
    Closed,

    /// Connect called while connected or reconnecting.
    #[error("already connected")]
    AlreadyConnected,

    /// A background reconnect gave up.
    #[error("reconnect failed: {0}")]
    ReconnectFailed(#[source] Box<StreamError>),

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Stream of connection and read errors.
pub type ErrorStream = FeedStream<StreamError>;

/// Upper bound on waiting for the socket writer while closing it.
const SOCKET_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Authenticated WebSocket URL.
    pub url: String,
    /// Dial retry configuration.
    pub reconnect: ReconnectConfig,
    /// Delivery queue capacities.
    pub delivery: DeliveryConfig,
}

impl StreamClientConfig {
    /// Create a configuration with default retry and queue settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }

    /// Build the client configuration from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream URL is invalid.
    pub fn from_stream_config(config: &StreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            url: config.stream_url()?,
            reconnect: ReconnectConfig::from_stream_settings(&config.stream),
            delivery: DeliveryConfig::from(config.queues),
        })
    }
}

// =============================================================================
// Stream Client
// =============================================================================

/// Tiqs tick stream client.
///
/// Manages the connection lifecycle including:
/// - Bounded dial retries with a fixed delay
/// - Resubscription after every successful dial
/// - Reconnection after read failures
/// - Subscription management
///
/// Always call [`StreamClient::close`] when done; the supervisor task keeps
/// the client alive until then.
pub struct StreamClient {
    config: StreamClientConfig,
    dialer: Arc<dyn Dialer>,
    codec: TickCodec,
    registry: SubscriptionRegistry,
    writer: AsyncMutex<Option<Box<dyn FeedSink>>>,
    state: parking_lot::RwLock<ConnectionState>,
    cancel: CancellationToken,
    publisher: parking_lot::Mutex<Option<DeliveryPublisher<StreamError>>>,
    supervisor: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("state", &*self.state.read())
            .field("subscriptions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Create a client and its consumer streams.
    #[must_use]
    pub fn new(
        config: StreamClientConfig,
        dialer: Arc<dyn Dialer>,
    ) -> (Arc<Self>, TickStream, ErrorStream) {
        let (publisher, ticks, errors) = delivery::channel(config.delivery);

        let client = Arc::new(Self {
            config,
            dialer,
            codec: TickCodec::new(),
            registry: SubscriptionRegistry::new(),
            writer: AsyncMutex::new(None),
            state: parking_lot::RwLock::new(ConnectionState::Disconnected),
            cancel: CancellationToken::new(),
            publisher: parking_lot::Mutex::new(Some(publisher)),
            supervisor: parking_lot::Mutex::new(None),
        });

        (client, ticks, errors)
    }

    /// Create a client that dials over TLS WebSocket.
    #[must_use]
    pub fn websocket(config: StreamClientConfig) -> (Arc<Self>, TickStream, ErrorStream) {
        Self::new(config, Arc::new(TungsteniteDialer::new()))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect and start the receive loop.
    ///
    /// Dials up to the configured number of attempts with a fixed delay
    /// between them, restores subscriptions, then spawns the supervisor.
    ///
    /// # Errors
    ///
    /// - `Closed` if the client was closed before or during the call
    /// - `AlreadyConnected` if connected or reconnecting
    /// - `Dial` if every attempt failed; the client returns to Disconnected
    pub async fn connect(self: &Arc<Self>) -> Result<(), StreamError> {
        self.begin_connect()?;

        let source = match self.dial_with_retry().await {
            Ok(source) => source,
            Err(e) => {
                self.transition(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.spawn_supervisor(source)
    }

    /// Close the client.
    ///
    /// Cancels the receive loop, waits for it to stop, closes both consumer
    /// streams (buffered items stay readable) and closes the socket.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if already closed.
    pub async fn close(&self) -> Result<(), StreamError> {
        {
            let mut state = self.state.write();
            if state.is_closed() {
                return Err(StreamError::Closed);
            }
            *state = ConnectionState::Closed;
        }
        metrics::set_connection_state(ConnectionState::Closed);
        tracing::info!("Closing Tiqs stream client");

        self.cancel.cancel();

        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Stream supervisor task failed");
        }

        drop(self.publisher.lock().take());

        tokio::select! {
            mut writer = self.writer.lock() => close_sink(writer.take()).await,
            () = tokio::time::sleep(SOCKET_CLOSE_TIMEOUT) => {
                tracing::warn!("Timed out waiting for the socket writer, abandoning socket");
            }
        }

        Ok(())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe `tokens` in `mode` and send the request.
    ///
    /// The registry keeps the subscription even if the send fails; it is
    /// restored on the next (re)connect.
    ///
    /// # Errors
    ///
    /// - `Closed` if the client is closed
    /// - `NotConnected` if there is no live socket
    /// - `Send` if the write fails
    pub async fn subscribe(&self, tokens: &[Token], mode: Mode) -> Result<(), StreamError> {
        self.ensure_open()?;
        if tokens.is_empty() {
            return Ok(());
        }

        let request = self.registry.subscribe(tokens, mode);
        metrics::set_subscribed_tokens(self.registry.len());
        tracing::info!(mode = %mode, tokens = ?tokens, "Subscribing");

        self.send_request(&request).await
    }

    /// Unsubscribe `tokens` and send the request.
    ///
    /// Tokens leave the registry whatever mode they were stored under.
    ///
    /// # Errors
    ///
    /// Same as [`StreamClient::subscribe`].
    pub async fn unsubscribe(&self, tokens: &[Token], mode: Mode) -> Result<(), StreamError> {
        self.ensure_open()?;
        if tokens.is_empty() {
            return Ok(());
        }

        let request = self.registry.unsubscribe(tokens, mode);
        metrics::set_subscribed_tokens(self.registry.len());
        tracing::info!(mode = %mode, tokens = ?tokens, "Unsubscribing");

        self.send_request(&request).await
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the receive loop is running on a live socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The subscription registry.
    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin_connect(&self) -> Result<(), StreamError> {
        let mut state = self.state.write();
        match *state {
            ConnectionState::Closed => Err(StreamError::Closed),
            ConnectionState::Connecting | ConnectionState::Connected => {
                Err(StreamError::AlreadyConnected)
            }
            ConnectionState::Disconnected => {
                *state = ConnectionState::Connecting;
                drop(state);
                metrics::set_connection_state(ConnectionState::Connecting);
                Ok(())
            }
        }
    }

    /// Start the supervisor unless close has already begun.
    ///
    /// Close cancels the token before it takes the handle.
    fn spawn_supervisor(self: &Arc<Self>, source: Box<dyn FeedSource>) -> Result<(), StreamError> {
        let mut supervisor = self.supervisor.lock();
        if self.cancel.is_cancelled() {
            return Err(StreamError::Closed);
        }
        let publisher = self.publisher.lock().clone().ok_or(StreamError::Closed)?;

        let client = Arc::clone(self);
        *supervisor = Some(tokio::spawn(client.supervise(source, publisher)));
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StreamError> {
        if self.state().is_closed() {
            Err(StreamError::Closed)
        } else {
            Ok(())
        }
    }

    /// Apply a legal transition. Returns false if it was refused.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return false;
        }
        tracing::debug!(from = %*state, to = %next, "Connection state changed");
        *state = next;
        drop(state);
        metrics::set_connection_state(next);
        true
    }

    fn report(&self, error: StreamError) {
        let publisher = self.publisher.lock().clone();
        if let Some(publisher) = publisher {
            publisher.try_publish_error(error);
        }
    }

    async fn send_request(&self, request: &SubscriptionRequest) -> Result<(), StreamError> {
        let json = request.to_json()?;

        let mut writer = tokio::select! {
            () = self.cancel.cancelled() => return Err(StreamError::Closed),
            writer = self.writer.lock() => writer,
        };
        let sink = writer.as_mut().ok_or(StreamError::NotConnected)?;
        let result = self.send_control(sink.as_mut(), json).await;
        if let Err(StreamError::Send(e)) = &result {
            tracing::warn!(error = %e, "Failed to send control message");
        }
        result
    }

    /// Write one control message unless the client is closed first.
    async fn send_control(
        &self,
        sink: &mut dyn FeedSink,
        json: String,
    ) -> Result<(), StreamError> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(StreamError::Closed),
            result = sink.send_text(json) => result.map_err(StreamError::Send),
        }
    }

    /// Dial with retries. On success the sink is installed, subscriptions
    /// are restored and the state is Connected.
    ///
    /// The writer lock is held for each attempt and the resubscription that
    /// follows it; the delay between attempts is slept without it.
    async fn dial_with_retry(&self) -> Result<Box<dyn FeedSource>, StreamError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let max_attempts = policy.max_attempts();
        let mut last_error = TransportError::Dial("no attempt made".to_string());

        while let Some(attempt) = policy.next_attempt() {
            tracing::info!(attempt, max_attempts, "Connecting to Tiqs stream");
            metrics::record_dial_attempt();

            {
                let mut writer = self.writer.lock().await;

                let dialed = tokio::select! {
                    () = self.cancel.cancelled() => return Err(StreamError::Closed),
                    result = self.dialer.dial(&self.config.url) => result,
                };

                match dialed {
                    Ok((mut sink, source)) => {
                        if self.cancel.is_cancelled()
                            || !self.transition(ConnectionState::Connected)
                        {
                            close_sink(Some(sink)).await;
                            return Err(StreamError::Closed);
                        }
                        tracing::info!(attempt, "Connected to Tiqs stream");
                        if let Err(e) = self.resubscribe(sink.as_mut()).await {
                            close_sink(Some(sink)).await;
                            return Err(e);
                        }
                        *writer = Some(sink);
                        return Ok(source);
                    }
                    Err(e) => {
                        tracing::warn!(attempt, max_attempts, error = %e, "Dial attempt failed");
                        metrics::record_dial_failure();
                        last_error = e;
                    }
                }
            }

            if let Some(delay) = policy.delay_before_next() {
                tokio::select! {
                    () = self.cancel.cancelled() => return Err(StreamError::Closed),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::error!(
            attempts = policy.attempt_count(),
            error = %last_error,
            "Giving up on Tiqs stream"
        );
        Err(StreamError::Dial {
            attempts: policy.attempt_count(),
            source: last_error,
        })
    }

    /// Send one subscribe request per mode in the registry.
    ///
    /// Send failures are reported and skipped; only `Closed` stops it.
    async fn resubscribe(&self, sink: &mut dyn FeedSink) -> Result<(), StreamError> {
        for request in self.registry.resubscribe_requests() {
            tracing::info!(
                mode = %request.mode,
                count = request.tokens.len(),
                "Restoring subscriptions"
            );

            let json = match request.to_json() {
                Ok(json) => json,
                Err(e) => {
                    self.report(StreamError::Encode(e));
                    continue;
                }
            };

            match self.send_control(sink, json).await {
                Ok(()) => {}
                Err(StreamError::Closed) => return Err(StreamError::Closed),
                Err(e) => {
                    tracing::warn!(
                        mode = %request.mode,
                        error = %e,
                        "Failed to restore subscriptions"
                    );
                    self.report(e);
                }
            }
        }
        Ok(())
    }

    /// Drop the current socket writer. Left to `close` once cancelled.
    async fn discard_writer(&self) {
        let sink = tokio::select! {
            () = self.cancel.cancelled() => return,
            mut writer = self.writer.lock() => writer.take(),
        };
        close_sink(sink).await;
    }

    /// Receive loop plus reconnect iteration.
    async fn supervise(
        self: Arc<Self>,
        mut source: Box<dyn FeedSource>,
        publisher: DeliveryPublisher<StreamError>,
    ) {
        loop {
            let Err(error) = self.receive(source.as_mut(), &publisher).await else {
                tracing::debug!("Receive loop cancelled");
                break;
            };

            tracing::warn!(error = %error, "Tiqs stream read failed, reconnecting");
            publisher.try_publish_error(StreamError::Read(error));

            if !self.transition(ConnectionState::Connecting) {
                break;
            }
            metrics::record_reconnect();
            self.discard_writer().await;

            match self.dial_with_retry().await {
                Ok(next) => source = next,
                Err(StreamError::Closed) => break,
                Err(e) => {
                    publisher.try_publish_error(StreamError::ReconnectFailed(Box::new(e)));
                    self.transition(ConnectionState::Disconnected);
                    break;
                }
            }
        }
    }

    /// Read frames until cancelled (`Ok`) or the socket fails (`Err`).
    async fn receive(
        &self,
        source: &mut dyn FeedSource,
        publisher: &DeliveryPublisher<StreamError>,
    ) -> Result<(), TransportError> {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                frame = source.next_frame() => frame?,
            };

            match frame {
                Some(InboundFrame::Binary(data)) => self.handle_binary(&data, publisher),
                Some(InboundFrame::Text(text)) => {
                    tracing::debug!(len = text.len(), text = %text, "Ignoring text frame");
                }
                Some(InboundFrame::Control) => {}
                None => return Err(TransportError::Closed),
            }
        }
    }

    fn handle_binary(&self, data: &[u8], publisher: &DeliveryPublisher<StreamError>) {
        match self.codec.decode(data) {
            Ok(tick) => {
                if let Ok(kind) = FrameKind::classify(data.len()) {
                    metrics::record_frame(kind);
                }
                publisher.try_publish_tick(tick);
            }
            Err(e) => {
                tracing::warn!(len = data.len(), error = %e, "Skipping malformed frame");
                metrics::record_malformed_frame();
            }
        }
    }
}

/// Close a socket writer, bounded so a stalled peer cannot block shutdown.
async fn close_sink(sink: Option<Box<dyn FeedSink>>) {
    let Some(mut sink) = sink else {
        return;
    };
    match tokio::time::timeout(SOCKET_CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "Error closing socket"),
        Err(_) => tracing::debug!("Timed out closing socket"),
    }
}

// =============================================================================
// Tests
// =============================================================================
