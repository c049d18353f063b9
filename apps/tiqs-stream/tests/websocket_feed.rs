//! WebSocket Transport Integration Tests
//!
//! Runs the client against a local `tokio-tungstenite` server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use tiqs_stream::{
    ConnectionState, Credentials, Mode, StreamClient, StreamClientConfig, StreamConfig,
    StreamError,
};

const WAIT: Duration = Duration::from_secs(5);

fn quote_frame(token: i32, ltp: i32, close: i32) -> Vec<u8> {
    let mut frame = vec![0u8; 17];
    frame[0..4].copy_from_slice(&token.to_be_bytes());
    frame[4..8].copy_from_slice(&ltp.to_be_bytes());
    frame[13..17].copy_from_slice(&close.to_be_bytes());
    frame
}

fn local_config(addr: std::net::SocketAddr, max_retries: u32) -> StreamClientConfig {
    let mut config = StreamConfig::new(Credentials::new("app-7".to_string(), "secret".to_string()));
    config.stream.url = format!("ws://{addr}");
    config.stream.retry_delay = Duration::from_millis(20);
    config.stream.max_retries = max_retries;
    StreamClientConfig::from_stream_config(&config).unwrap()
}

#[tokio::test]
async fn subscribes_and_receives_ticks_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (uri_tx, uri_rx) = oneshot::channel::<String>();
    let (text_tx, mut text_rx) = mpsc::unbounded_channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    text_tx.send(text.as_str().to_owned()).unwrap();
                    ws.send(Message::Text("subscribed".into())).await.unwrap();
                    ws.send(Message::Ping(vec![1u8, 2, 3].into())).await.unwrap();
                    ws.send(Message::Binary(vec![0u8; 4].into())).await.unwrap();
                    ws.send(Message::Binary(quote_frame(26_000, 105, 100).into()))
                        .await
                        .unwrap();
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let (client, mut ticks, mut errors) = StreamClient::websocket(local_config(addr, 1));
    client.connect().await.unwrap();

    let uri = timeout(WAIT, uri_rx).await.unwrap().unwrap();
    assert!(uri.contains("appId=app-7"));
    assert!(uri.contains("token=secret"));

    client.subscribe(&[26_000], Mode::Full).await.unwrap();
    let text = timeout(WAIT, text_rx.recv()).await.unwrap().unwrap();
    assert_eq!(text, r#"{"code":"sub","mode":"full","full":[26000]}"#);

    let tick = timeout(WAIT, ticks.recv()).await.unwrap().unwrap();
    assert_eq!(tick.token, 26_000);
    assert_eq!(tick.ltp, 105);
    assert_eq!(tick.net_change, 5);

    assert!(errors.try_recv().is_err());

    client.close().await.unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
    assert!(timeout(WAIT, ticks.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn server_close_triggers_resubscribe_on_new_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (text_tx, mut text_rx) = mpsc::unbounded_channel::<(usize, String)>();

    let server = tokio::spawn(async move {
        for connection in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => {
                        text_tx.send((connection, text.as_str().to_owned())).unwrap();
                        if connection == 0 {
                            ws.close(None).await.unwrap();
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    let (client, _ticks, mut errors) = StreamClient::websocket(local_config(addr, 5));
    client.connect().await.unwrap();
    client.subscribe(&[11, 12], Mode::Quote).await.unwrap();

    let (first, sub) = timeout(WAIT, text_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first, 0);
    assert_eq!(sub, r#"{"code":"sub","mode":"quote","quote":[11,12]}"#);

    let read = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(read, StreamError::Read(_)));

    let (second, resub) = timeout(WAIT, text_rx.recv()).await.unwrap().unwrap();
    assert_eq!(second, 1);
    assert_eq!(resub, r#"{"code":"sub","mode":"quote","quote":[11,12]}"#);

    timeout(WAIT, async {
        while client.state() != ConnectionState::Connected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    client.close().await.unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_server_exhausts_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, _ticks, _errors) = StreamClient::websocket(local_config(addr, 2));
    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, StreamError::Dial { attempts: 2, .. }));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.close().await.unwrap();
}
