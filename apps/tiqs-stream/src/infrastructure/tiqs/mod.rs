//! Tiqs WebSocket Adapter
//!
//! Streaming client for the Tiqs tick feed:
//!
//! - **codec**: binary tick frame decoder
//! - **reconnect**: bounded fixed-delay dial retries
//! - **client**: connection manager and receive loop
//! - **websocket**: `tokio-tungstenite` transport

pub mod client;
pub mod codec;
pub mod reconnect;
pub mod websocket;

pub use client::{ErrorStream, StreamClient, StreamClientConfig, StreamError};
pub use codec::{CodecError, FrameKind, TickCodec, decode_frame, net_change_percent};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use websocket::TungsteniteDialer;
