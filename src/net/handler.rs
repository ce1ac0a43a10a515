//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - WebSocket upgrade and session registration
//! - Decoding text frames into game events for the dispatcher
//! - A writer task draining the session's outbound queue
//! - Idle timeouts and graceful disconnection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, ProtocolError, Result, WordChainError};
use crate::game::player::ConnectionId;
use crate::game::session::Event;
use crate::net::session::Session;
use crate::protocol::{decode_client_message, ClientMessage, ServerMessage};
use crate::AppState;

type WsStream = WebSocketStream<TcpStream>;

/// How long a closing connection's writer may take to flush before it is aborted
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection handler for processing client connections
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a WebSocket connection from upgrade to close
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        stream.set_nodelay(true)?;

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| WordChainError::Network(NetworkError::WebSocket(e.to_string())))?;

        info!(address = %addr, "WebSocket connection established");

        let (sink, mut frames) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(self.state.config.outbound_buffer);

        let session = self.state.session_manager.create_session(addr, outbound_tx)?;
        let connection = session.id;

        let writer = tokio::spawn(write_loop(connection, sink, outbound_rx));

        let result = self.read_loop(&session, &mut frames).await;

        debug!(connection, "Connection handler ending");

        if let Err(e) = self.state.dispatcher.send(connection, Event::Disconnect).await {
            trace!(connection, error = %e, "Dispatcher gone before disconnect");
        }
        self.state.session_manager.remove(connection);

        // The session owns the only sender; with the manager's copy gone,
        // dropping ours lets the writer drain what is queued and stop.
        drop(session);

        settle_writer(connection, writer, WRITER_DRAIN_TIMEOUT).await;

        result
    }

    /// Read frames until the client leaves, idles out or the server stops
    async fn read_loop(&self, session: &Session, frames: &mut SplitStream<WsStream>) -> Result<()> {
        let connection = session.id;
        let idle_timeout = Duration::from_secs(self.state.config.idle_timeout_secs);
        let mut shutdown_rx = self.state.shutdown_tx.subscribe();

        loop {
            let next = tokio::select! {
                next = timeout(idle_timeout, frames.next()) => next,
                _ = shutdown_rx.recv() => {
                    debug!(connection, "Closing connection for shutdown");
                    return Ok(());
                }
                _ = session.closed() => {
                    debug!(connection, "Session dropped by the server");
                    return Ok(());
                }
            };

            let frame = match next {
                Err(_) => {
                    info!(connection, idle_secs = idle_timeout.as_secs(), "Idle timeout");
                    return Ok(());
                }
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => {
                    return Err(WordChainError::Network(NetworkError::WebSocket(
                        e.to_string(),
                    )))
                }
                Ok(Some(Ok(frame))) => frame,
            };

            if !session.is_active() {
                debug!(connection, "Session dropped by the server");
                return Ok(());
            }

            match frame {
                Message::Text(text) => self.handle_text(connection, &text).await?,
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => self.handle_text(connection, &text).await?,
                    Err(_) => self.reject(connection, ProtocolError::InvalidFormat).await?,
                },
                Message::Close(_) => {
                    debug!(connection, "WebSocket close message received");
                    return Ok(());
                }
                // Control frames are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Decode a frame and forward it to the dispatcher
    async fn handle_text(&self, connection: ConnectionId, text: &str) -> Result<()> {
        match decode_client_message(text) {
            Ok(message) => {
                trace!(connection, message = ?message, "Decoded client message");
                self.state.dispatcher.send(connection, message.into()).await
            }
            Err(e) => self.reject(connection, e).await,
        }
    }

    /// Report an undecodable frame to its sender, in order with its other replies
    async fn reject(&self, connection: ConnectionId, error: ProtocolError) -> Result<()> {
        debug!(connection, error = ?error, "Rejected client frame");
        self.state.dispatcher.send(connection, Event::Malformed(error)).await
    }
}

impl From<ClientMessage> for Event {
    fn from(message: ClientMessage) -> Self {
        match message {
            ClientMessage::Join { username } => Event::Join { username },
            ClientMessage::Word { word } => Event::SubmitWord { word },
            ClientMessage::Ping => Event::Ping,
        }
    }
}

/// Wait for a writer to finish flushing, aborting it after `grace`.
///
/// Returns `false` if the writer had to be aborted.
async fn settle_writer(
    connection: ConnectionId,
    mut writer: JoinHandle<()>,
    grace: Duration,
) -> bool {
    match timeout(grace, &mut writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            trace!(connection, error = %e, "Writer task ended abnormally");
            true
        }
        Err(_) => {
            warn!(connection, "Writer stalled on a peer that stopped reading, aborting");
            writer.abort();
            false
        }
    }
}

/// Drain the outbound queue into the socket
async fn write_loop(
    connection: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(connection, kind = message.kind(), error = %e, "Failed to encode message");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            // Dropping the receiver makes later deliveries fail, which the
            // dispatcher turns into a disconnect.
            debug!(connection, error = %e, "WebSocket write failed");
            break;
        }
    }

    if let Err(e) = sink.close().await {
        trace!(connection, error = %e, "Error during WebSocket close");
    }
}
