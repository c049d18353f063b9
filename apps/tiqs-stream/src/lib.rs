#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Tiqs Stream - Market Data Tick Client
//!
//! Maintains one long-lived WebSocket connection to the Tiqs tick feed,
//! restores subscriptions across reconnects, decodes binary tick frames and
//! hands them to a consumer through bounded, loss-tolerant queues.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming types
//!   - `streaming`: Tick, market depth and connection state
//!   - `subscription`: Modes, control messages and the subscription registry
//!
//! - **Application**: Port definitions
//!   - `ports`: Dialer and feed transport interfaces
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `tiqs`: Frame codec, reconnect policy, stream client, WebSocket dialer
//!   - `delivery`: Bounded tick and error queues
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐    ┌─────────┐    ┌─────────────┐
//! Tiqs WS ────────►│ receive loop │───►│ decoder │───►│ tick queue  │──► consumer
//!    ▲             └──────┬───────┘    └─────────┘    └─────────────┘
//!    │ sub/unsub          │ read error                ┌─────────────┐
//!    │                    └──────────────────────────►│ error queue │──► consumer
//! registry ◄── subscribe / unsubscribe                └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tiqs_stream::{Credentials, Mode, StreamClient, StreamClientConfig, StreamConfig};
//!
//! let config = StreamConfig::new(Credentials::new(app_id, token));
//! let (client, mut ticks, _errors) =
//!     StreamClient::websocket(StreamClientConfig::from_stream_config(&config)?);
//!
//! client.connect().await?;
//! client.subscribe(&[26000], Mode::Full).await?;
//!
//! while let Some(tick) = ticks.recv().await {
//!     println!("{} {}", tick.token, tick.ltp);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{
    ConnectionState, DEPTH_LEVELS, DepthLevel, MarketDepth, NetChangeIndicator, Tick, Token,
};
pub use domain::subscription::{
    Mode, ModeError, SubscriptionAction, SubscriptionRegistry, SubscriptionRequest,
    SubscriptionStats,
};

// Ports
pub use application::ports::{
    Dialer, FeedConnection, FeedSink, FeedSource, InboundFrame, TransportError,
};

// Stream client
pub use infrastructure::tiqs::{
    CodecError, ErrorStream, ReconnectConfig, StreamClient, StreamClientConfig, StreamError,
    TickCodec, TungsteniteDialer, decode_frame,
};

// Delivery queues
pub use infrastructure::delivery::{
    Delivery, DeliveryConfig, DeliveryPublisher, FeedStream, TickStream,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, Credentials, QueueSettings, StreamConfig, StreamSettings,
};

// Metrics
pub use infrastructure::metrics::{MetricsError, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
