//! Prometheus Metrics Module
//!
//! Application metrics recorded through the `metrics` facade. Recording is a
//! no-op until a recorder is installed, so library users who do not call
//! [`init_metrics`] pay nothing beyond the macro call.
//!
//! # Metrics Categories
//!
//! - **Frames**: Binary frames received by variant, malformed frames
//! - **Delivery**: Items delivered to and dropped from the consumer queues
//! - **Connection**: Dial attempts, reconnects, connection state
//! - **Subscriptions**: Subscribed token count
//!
//! # Integration
//!
//! The binary installs the Prometheus exporter with its own HTTP listener,
//! serving `/metrics` on `TIQS_METRICS_PORT`.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::ConnectionState;
use crate::infrastructure::tiqs::codec::FrameKind;

/// Errors raised while installing the exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter or global recorder could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] BuildError),
}

/// Install the Prometheus recorder and HTTP listener on `port`.
///
/// Port 0 disables the exporter and returns `Ok(false)`. Must be called from
/// within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a global recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<bool, MetricsError> {
    if port == 0 {
        return Ok(false);
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    register_metrics();
    Ok(true)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tiqs_stream_frames_received_total",
        "Binary frames received from the Tiqs feed by variant"
    );
    describe_counter!(
        "tiqs_stream_malformed_frames_total",
        "Binary frames that failed to decode"
    );
    describe_counter!(
        "tiqs_stream_delivered_total",
        "Items queued for the consumer"
    );
    describe_counter!(
        "tiqs_stream_dropped_total",
        "Items dropped because a consumer queue was full"
    );
    describe_counter!("tiqs_stream_dial_attempts_total", "WebSocket dial attempts");
    describe_counter!(
        "tiqs_stream_dial_failures_total",
        "WebSocket dial attempts that failed"
    );
    describe_counter!(
        "tiqs_stream_reconnects_total",
        "Reconnects triggered by read failures"
    );
    describe_gauge!(
        "tiqs_stream_connection_state",
        "0 disconnected, 1 connecting, 2 connected, 3 closed"
    );
    describe_gauge!(
        "tiqs_stream_subscribed_tokens",
        "Number of tokens in the subscription registry"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for the consumer queues.
#[derive(Debug, Clone, Copy)]
pub enum QueueKind {
    /// Decoded ticks.
    Ticks,
    /// Stream errors.
    Errors,
}

impl QueueKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ticks => "ticks",
            Self::Errors => "errors",
        }
    }
}

/// Record a decoded binary frame.
pub fn record_frame(kind: FrameKind) {
    counter!(
        "tiqs_stream_frames_received_total",
        "variant" => kind.as_str()
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_malformed_frame() {
    counter!("tiqs_stream_malformed_frames_total").increment(1);
}

/// Record an item queued for the consumer.
pub fn record_delivered(queue: QueueKind) {
    counter!("tiqs_stream_delivered_total", "queue" => queue.as_str()).increment(1);
}

/// Record an item dropped on a full queue.
pub fn record_dropped(queue: QueueKind) {
    counter!("tiqs_stream_dropped_total", "queue" => queue.as_str()).increment(1);
}

/// Record a dial attempt.
pub fn record_dial_attempt() {
    counter!("tiqs_stream_dial_attempts_total").increment(1);
}

/// Record a failed dial attempt.
pub fn record_dial_failure() {
    counter!("tiqs_stream_dial_failures_total").increment(1);
}

/// Record a reconnect triggered by a read failure.
pub fn record_reconnect() {
    counter!("tiqs_stream_reconnects_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("tiqs_stream_connection_state").set(state.as_gauge());
}

/// Update the subscribed token gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_tokens(count: usize) {
    gauge!("tiqs_stream_subscribed_tokens").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
