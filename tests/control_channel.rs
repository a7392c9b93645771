//! Integration tests for the WebSocket control channel against an
//! in-process server.

use futures::{SinkExt, StreamExt};
use rovercam::{ChannelState, ControlChannel, SessionDescriptionBody, SignalEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn connect_opens_channel() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        // Hold the connection open until the test ends.
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(ws);
    });

    let channel = ControlChannel::connect(&url, CONNECT_TIMEOUT).await.unwrap();
    assert_eq!(channel.state(), ChannelState::Open);
    assert_eq!(channel.url(), url);
}

#[tokio::test]
async fn sent_offer_arrives_with_wire_shape() {
    let (listener, url) = bind().await;
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                frame_tx.send(text).unwrap();
            }
        }
    });

    let channel = ControlChannel::connect(&url, CONNECT_TIMEOUT).await.unwrap();
    let body = SessionDescriptionBody {
        sdp: "v=0\r\n".to_string(),
        kind: "offer".to_string(),
    };
    channel.send(&SignalEnvelope::offer(&body).unwrap()).unwrap();

    let text = tokio::time::timeout(RECV_TIMEOUT, frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["type"], "offer");
    assert_eq!(json["body"]["sdp"], "v=0\r\n");
    assert_eq!(json["body"]["type"], "offer");
}

#[tokio::test]
async fn inbound_envelopes_reach_handler_and_garbage_is_tolerated() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("not json at all".to_string()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"answer","body":{"sdp":"v=0","type":"answer"}}"#.to_string(),
        ))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let channel = ControlChannel::connect(&url, CONNECT_TIMEOUT).await.unwrap();
    let (env_tx, mut env_rx) = mpsc::unbounded_channel();
    channel.set_message_handler(Arc::new(move |envelope: SignalEnvelope| {
        env_tx.send(envelope).unwrap();
    }));

    let envelope = tokio::time::timeout(RECV_TIMEOUT, env_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(envelope.is_answer());
    assert_eq!(envelope.description_body().unwrap().sdp, "v=0");

    // The unparseable frame never reaches the handler and the channel
    // survives it.
    assert_eq!(channel.state(), ChannelState::Open);
}

#[tokio::test]
async fn remote_close_fires_close_handler_once() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let channel = ControlChannel::connect(&url, CONNECT_TIMEOUT).await.unwrap();
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    channel.set_close_handler(Arc::new(move |reason: String| {
        close_tx.send(reason).unwrap();
    }));

    let reason = tokio::time::timeout(RECV_TIMEOUT, close_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!reason.is_empty());
    assert!(matches!(channel.state(), ChannelState::Closed(_)));

    // No second invocation even after a local close on top.
    channel.close();
    assert!(
        tokio::time::timeout(Duration::from_millis(200), close_rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn send_on_closed_channel_is_dropped_not_errored() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
    });

    let channel = ControlChannel::connect(&url, CONNECT_TIMEOUT).await.unwrap();
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    channel.set_close_handler(Arc::new(move |reason: String| {
        let _ = close_tx.send(reason);
    }));
    tokio::time::timeout(RECV_TIMEOUT, close_rx.recv())
        .await
        .unwrap();

    let body = SessionDescriptionBody {
        sdp: "v=0".to_string(),
        kind: "offer".to_string(),
    };
    assert!(channel
        .send(&SignalEnvelope::offer(&body).unwrap())
        .is_ok());
}
