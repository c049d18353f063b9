//! Port Interfaces
//!
//! Defines the transport contracts the streaming client depends on. The
//! WebSocket adapter in the infrastructure layer implements them; tests
//! substitute in-memory transports.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Dialer`: opens a connection and splits it into a sink and a source
//! - `FeedSink`: writes control messages to the feed
//! - `FeedSource`: reads frames from the feed

use async_trait::async_trait;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("dial failed: {0}")]
    Dial(String),

    /// Reading a frame failed.
    #[error("read failed: {0}")]
    Read(String),

    /// Writing a frame failed.
    #[error("write failed: {0}")]
    Write(String),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

/// A frame received from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Binary tick payload.
    Binary(Vec<u8>),
    /// Text payload (acknowledgements, server notices).
    Text(String),
    /// Ping, pong or other control traffic already handled by the transport.
    Control,
}

/// Write half of a feed connection.
#[async_trait]
pub trait FeedSink: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a feed connection.
#[async_trait]
pub trait FeedSource: Send {
    /// Wait for the next frame.
    ///
    /// Returns `Ok(None)` when the stream has ended.
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError>;
}

/// Both halves of a freshly dialed connection.
pub type FeedConnection = (Box<dyn FeedSink>, Box<dyn FeedSource>);

/// Opens feed connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `url` and return the connection halves.
    async fn dial(&self, url: &str) -> Result<FeedConnection, TransportError>;
}
