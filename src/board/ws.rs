use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use super::models::BoardId;
use super::session::Session;
use crate::errors::BoardError;

/// How often to send WebSocket Ping frames.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Close code the backend uses for a missing or invalid credential.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// Close code the backend uses when the user is not a board member.
pub const CLOSE_FORBIDDEN: u16 = 4003;

// ── Signals ───────────────────────────────────────────────────────────

/// One inbound message: "the board may have changed".
///
/// The payload is decoded for diagnostics only. Nothing in the client acts
/// on its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub payload: serde_json::Value,
}

impl Signal {
    pub fn from_text(text: &str) -> Self {
        let payload = serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.to_string()));
        Self { payload }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::from_text(text),
            Err(_) => Self {
                payload: serde_json::Value::Null,
            },
        }
    }

    /// The backend's `type` tag, when there is one.
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(|t| t.as_str())
    }
}

/// Why a channel stopped delivering signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEnd {
    Closed { code: Option<u16>, reason: String },
    Failed(String),
    KeepaliveTimeout,
}

impl ChannelEnd {
    /// The backend refused the credential or membership; reconnecting is pointless.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Closed {
                code: Some(CLOSE_UNAUTHORIZED | CLOSE_FORBIDDEN),
                ..
            }
        )
    }
}

impl fmt::Display for ChannelEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { code: Some(code), reason } if !reason.is_empty() => {
                write!(f, "closed by server ({}: {})", code, reason)
            }
            Self::Closed { code: Some(code), .. } => write!(f, "closed by server ({})", code),
            Self::Closed { code: None, .. } => write!(f, "connection closed"),
            Self::Failed(msg) => write!(f, "connection failed: {}", msg),
            Self::KeepaliveTimeout => write!(f, "no pong within {}s", PONG_TIMEOUT.as_secs()),
        }
    }
}

// ── Seams ─────────────────────────────────────────────────────────────

/// A live per-board connection yielding invalidation signals.
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next signal. Returns `Err` once the connection is gone.
    async fn next_signal(&mut self) -> Result<Signal, ChannelEnd>;

    /// Release the connection. Must be safe to call after the channel ended.
    async fn close(&mut self);
}

/// Opens a [`SignalSource`] for a board.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, board_id: BoardId) -> Result<Box<dyn SignalSource>, BoardError>;
}

// ── WebSocket implementation ──────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to `{ws_url}/ws/{board_id}?token=...` using the session credential.
#[derive(Debug, Clone)]
pub struct WsConnector {
    session: Arc<Session>,
}

impl WsConnector {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self, board_id: BoardId) -> Result<Box<dyn SignalSource>, BoardError> {
        let url = self.session.channel_url(board_id)?;
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| BoardError::Transport(format!("channel connect failed: {}", e)))?;
        info!(board_id, "notification channel open");
        Ok(Box::new(NotificationChannel::new(board_id, stream)))
    }
}

/// WebSocket-backed [`SignalSource`] with ping/pong keepalive.
pub struct NotificationChannel {
    board_id: BoardId,
    stream: WsStream,
    ping_interval: Interval,
    last_pong: Instant,
    awaiting_pong: bool,
    ended: Option<ChannelEnd>,
}

impl NotificationChannel {
    fn new(board_id: BoardId, stream: WsStream) -> Self {
        // First ping fires after one full interval.
        let mut ping_interval =
            tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            board_id,
            stream,
            ping_interval,
            last_pong: Instant::now(),
            awaiting_pong: false,
            ended: None,
        }
    }

    fn end(&mut self, end: ChannelEnd) -> Result<Signal, ChannelEnd> {
        debug!(board_id = self.board_id, %end, "notification channel ended");
        self.ended = Some(end.clone());
        Err(end)
    }
}

#[async_trait]
impl SignalSource for NotificationChannel {
    async fn next_signal(&mut self) -> Result<Signal, ChannelEnd> {
        if let Some(end) = &self.ended {
            return Err(end.clone());
        }

        loop {
            tokio::select! {
                _ = self.ping_interval.tick() => {
                    if self.awaiting_pong && self.last_pong.elapsed() > PONG_TIMEOUT {
                        return self.end(ChannelEnd::KeepaliveTimeout);
                    }
                    if let Err(e) = self.stream.send(Message::Ping(Default::default())).await {
                        return self.end(ChannelEnd::Failed(e.to_string()));
                    }
                    self.awaiting_pong = true;
                }

                msg = self.stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let signal = Signal::from_text(text.as_str());
                            trace!(board_id = self.board_id, kind = ?signal.kind(), "signal received");
                            return Ok(signal);
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            return Ok(Signal::from_bytes(&bytes));
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.last_pong = Instant::now();
                            self.awaiting_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let end = match frame {
                                Some(frame) => ChannelEnd::Closed {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.to_string(),
                                },
                                None => ChannelEnd::Closed { code: None, reason: String::new() },
                            };
                            return self.end(end);
                        }
                        None => {
                            return self.end(ChannelEnd::Closed { code: None, reason: String::new() });
                        }
                        Some(Ok(_)) => {
                            // Ping (auto-answered by tungstenite) and raw frames.
                        }
                        Some(Err(e)) => return self.end(ChannelEnd::Failed(e.to_string())),
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(board_id = self.board_id, error = %e, "close handshake skipped");
        }
        if self.ended.is_none() {
            self.ended = Some(ChannelEnd::Closed {
                code: None,
                reason: "closed by client".into(),
            });
        }
        info!(board_id = self.board_id, "notification channel closed");
    }
}
