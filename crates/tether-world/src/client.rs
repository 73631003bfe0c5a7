//! WebSocket game client
//!
//! Each `connect` opens one socket to the adapter, introduces itself with a
//! `hello` frame and then runs two tasks: a writer draining [`ClientOp`]s
//! from the handle and a reader turning frames into session signals.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn, Instrument};

use tether_config::WorldConfig;
use tether_core::{ClientError, GameClient, GameEvent, GameHandle, SessionSink};
use tether_observability::session_span;

use crate::protocol::{classify, ClientOp, Inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Game client backed by a WebSocket adapter
#[derive(Debug, Clone)]
pub struct WsGameClient {
    config: WorldConfig,
}

impl WsGameClient {
    pub fn new(config: WorldConfig) -> Self {
        Self { config }
    }

    fn hello(&self) -> ClientOp {
        ClientOp::Hello {
            username: self.config.username.clone(),
            auth: self.config.auth.to_string(),
            version: self.config.version.clone(),
        }
    }
}

#[async_trait]
impl GameClient for WsGameClient {
    async fn connect(&self, sink: SessionSink) -> Result<Box<dyn GameHandle>, ClientError> {
        let session = sink.session();
        debug!(session = %session, "Connecting to {}", self.config.url);

        let (ws, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut write, read) = ws.split();

        send_op(&mut write, &self.hello()).await?;
        info!(session = %session, "Connected to game adapter at {}", self.config.url);

        let (tx, rx) = mpsc::unbounded_channel();
        let span = session_span(&session.to_string());
        tokio::spawn(write_loop(write, rx).instrument(span.clone()));
        tokio::spawn(read_loop(read, sink).instrument(span));

        Ok(Box::new(WsGameHandle { tx }))
    }
}

/// Control handle of one adapter socket
#[derive(Debug)]
pub struct WsGameHandle {
    tx: mpsc::UnboundedSender<ClientOp>,
}

#[async_trait]
impl GameHandle for WsGameHandle {
    async fn chat(&self, text: &str) -> Result<(), ClientError> {
        self.tx
            .send(ClientOp::Chat {
                text: text.to_string(),
            })
            .map_err(|_| ClientError::Closed)
    }

    async fn quit(&self) -> Result<(), ClientError> {
        self.tx.send(ClientOp::Quit).map_err(|_| ClientError::Closed)
    }
}

async fn send_op(
    write: &mut SplitSink<WsStream, Message>,
    op: &ClientOp,
) -> Result<(), ClientError> {
    let json = serde_json::to_string(op).map_err(|e| ClientError::Send(e.to_string()))?;
    write
        .send(Message::Text(json))
        .await
        .map_err(|e| ClientError::Send(e.to_string()))
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<ClientOp>,
) {
    while let Some(op) = rx.recv().await {
        let quit = op == ClientOp::Quit;
        if let Err(e) = send_op(&mut write, &op).await {
            warn!("Failed to send to game adapter: {}", e);
            break;
        }
        if quit {
            debug!("Quit sent, closing socket");
            break;
        }
    }
    let _ = write.close().await;
}

async fn read_loop(mut read: SplitStream<WsStream>, sink: SessionSink) {
    let ended = loop {
        let Some(message) = read.next().await else {
            break GameEvent::End {
                reason: "connection closed".to_string(),
            };
        };

        match message {
            Ok(Message::Text(text)) => {
                let delivered = match classify(&text) {
                    Inbound::Event(event) => sink.emit(event),
                    Inbound::Diagnostic(fragment) => sink.diagnostic(fragment),
                };
                if !delivered {
                    debug!("Bridge gone, stopping reader");
                    return;
                }
            }
            Ok(Message::Close(frame)) => break GameEvent::End {
                reason: close_reason(frame),
            },
            Ok(_) => {}
            Err(e) => {
                break GameEvent::Error {
                    message: e.to_string(),
                }
            }
        }
    };

    debug!("Game adapter socket finished: {:?}", ended);
    sink.emit(ended);
}

fn close_reason(frame: Option<CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => frame.reason.to_string(),
        _ => "connection closed".to_string(),
    }
}
