//! Persistent WebSocket control channel to the car's signaling server

use super::protocol::SignalEnvelope;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle state of a control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// WebSocket handshake in progress
    Connecting,
    /// Channel open, frames flow in both directions
    Open,
    /// Channel closed, with the reason it closed
    Closed(String),
}

/// Handler invoked for every inbound well-formed envelope
pub type MessageHandler = Arc<dyn Fn(SignalEnvelope) + Send + Sync>;

/// Handler invoked once when the channel transitions to `Closed`
pub type CloseHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Duplex signaling channel to one car
///
/// Holds one WebSocket connection for its lifetime. Outbound envelopes are
/// serialized to JSON text frames through a sender task; inbound frames are
/// parsed and dispatched to the registered message handler by a receiver
/// task. There is no reconnection logic: a closed channel stays closed and
/// the owner builds a new one.
pub struct ControlChannel {
    url: String,
    tx: mpsc::UnboundedSender<Message>,
    state: Arc<RwLock<ChannelState>>,
    handler: Arc<RwLock<Option<MessageHandler>>>,
    on_close: Arc<RwLock<Option<CloseHandler>>>,
}

impl ControlChannel {
    /// Connect to the car's signaling endpoint
    ///
    /// Resolves once the WebSocket handshake completes; the returned channel
    /// is `Open`. Fails with [`Error::Connect`] if the handshake errors or
    /// `timeout` elapses first.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!("Connecting to signaling server: {}", url);

        let state = Arc::new(RwLock::new(ChannelState::Connecting));

        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| Error::Connect(format!("timed out connecting to {}", url)))?
            .map_err(|e| Error::Connect(format!("failed to connect to {}: {}", url, e)))?;

        info!("Established signaling connection with {}", url);
        *state.write() = ChannelState::Open;

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        let handler: Arc<RwLock<Option<MessageHandler>>> = Arc::new(RwLock::new(None));
        let on_close: Arc<RwLock<Option<CloseHandler>>> = Arc::new(RwLock::new(None));

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(
            read,
            Arc::clone(&state),
            Arc::clone(&handler),
            Arc::clone(&on_close),
        ));

        Ok(Self {
            url: url.to_string(),
            tx,
            state,
            handler,
            on_close,
        })
    }

    /// Sender task: forwards queued frames to the WebSocket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("Failed to send signaling frame: {}", e);
                break;
            }
        }

        debug!("Signaling sender task terminated");
    }

    /// Receiver task: parses inbound frames and invokes the handler
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        state: Arc<RwLock<ChannelState>>,
        handler: Arc<RwLock<Option<MessageHandler>>>,
        on_close: Arc<RwLock<Option<CloseHandler>>>,
    ) {
        let reason = loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match SignalEnvelope::from_text(&text) {
                    Ok(envelope) => {
                        debug!("Received signaling envelope: type={}", envelope.kind);
                        let cb = handler.read().clone();
                        match cb {
                            Some(cb) => cb(envelope),
                            None => warn!("No message handler registered, dropping envelope"),
                        }
                    }
                    Err(e) => warn!("Ignoring unparseable signaling frame: {}", e),
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Signaling connection closed by remote peer");
                    break "closed by remote peer".to_string();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Signaling transport error: {}", e);
                    break format!("transport error: {}", e);
                }
                None => {
                    info!("Signaling stream ended");
                    break "stream ended".to_string();
                }
            }
        };

        Self::mark_closed(&state, &on_close, reason);
        debug!("Signaling receiver task terminated");
    }

    fn mark_closed(
        state: &Arc<RwLock<ChannelState>>,
        on_close: &Arc<RwLock<Option<CloseHandler>>>,
        reason: String,
    ) {
        {
            let mut st = state.write();
            if matches!(*st, ChannelState::Closed(_)) {
                return;
            }
            *st = ChannelState::Closed(reason.clone());
        }
        if let Some(cb) = on_close.read().clone() {
            cb(reason);
        }
    }

    /// Send a signaling envelope to the car
    ///
    /// Dropped with a warning if the channel is not `Open`; there is no
    /// buffering of frames across reconnects.
    pub fn send(&self, envelope: &SignalEnvelope) -> Result<()> {
        if *self.state.read() != ChannelState::Open {
            warn!(
                "Dropping {} envelope: channel to {} is not open",
                envelope.kind, self.url
            );
            return Ok(());
        }

        let json = envelope.to_text()?;
        debug!("Sending signaling envelope: {}", json);

        self.tx
            .send(Message::Text(json))
            .map_err(|e| Error::Signaling(format!("failed to queue frame: {}", e)))
    }

    /// Register the single inbound message handler
    ///
    /// Replaces any previously registered handler. The handler runs on the
    /// receiver task; long work should be spawned.
    pub fn set_message_handler(&self, handler: MessageHandler) {
        *self.handler.write() = Some(handler);
    }

    /// Register a handler invoked once when the channel closes
    pub fn set_close_handler(&self, handler: CloseHandler) {
        *self.on_close.write() = Some(handler);
    }

    /// Current channel state
    pub fn state(&self) -> ChannelState {
        self.state.read().clone()
    }

    /// URL this channel was connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the channel from the local side
    ///
    /// Sends a Close frame and marks the channel `Closed`. Safe to call on
    /// an already-closed channel.
    pub fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
        Self::mark_closed(
            &self.state,
            &self.on_close,
            "closed by local peer".to_string(),
        );
    }
}
