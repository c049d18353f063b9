//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Pings are answered by tungstenite while the read half is polled.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    Dialer, FeedConnection, FeedSink, FeedSource, InboundFrame, TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials `ws://` and `wss://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteDialer;

impl TungsteniteDialer {
    /// Create a new dialer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, url: &str) -> Result<FeedConnection, TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Dial(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();
        Ok((Box::new(WsSink { inner: write }), Box::new(WsSource { inner: read })))
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FeedSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.inner.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::Write(e.to_string())),
        }
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FeedSource for WsSource {
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        match self.inner.next().await {
            Some(Ok(Message::Binary(data))) => Ok(Some(InboundFrame::Binary(data.to_vec()))),
            Some(Ok(Message::Text(text))) => {
                Ok(Some(InboundFrame::Text(text.as_str().to_owned())))
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(frame = ?frame, "Server sent close frame");
                Ok(None)
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                Ok(Some(InboundFrame::Control))
            }
            Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
                Err(TransportError::Closed)
            }
            Some(Err(e)) => Err(TransportError::Read(e.to_string())),
            None => Ok(None),
        }
    }
}
