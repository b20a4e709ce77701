//! The reconciliation loop: fetch once on entry, refetch on every signal.
//!
//! ```text
//!   BoardView::run()
//!     ├─ fetch #0 (initial)                   failure ends the view
//!     ├─ ChannelConnector::connect(board)     one socket per view, polled in the loop
//!     └─ loop select!
//!          ├─ cancel                          teardown, close channel
//!          ├─ handshake done ──> channel      catch-up fetch if a fetch already landed
//!          ├─ fetch #n done ──> SnapshotStore::replace()
//!          ├─ signal ──> fetch #n+1           payload ignored
//!          ├─ manual refresh ──> fetch #n+1
//!          └─ reconnect timer ──> handshake   only with a ReconnectPolicy
//! ```
//!
//! A handshake never blocks the loop: it sits in its own slot next to the
//! in-flight fetches, so a peer that accepts TCP and never upgrades leaves
//! the view serving fetches and answering `close()`.
//!
//! Fetches run concurrently inside the loop task. Under
//! [`FetchOrdering::LastProcessedWins`] whichever response completes last is
//! what the store holds, even if it was issued first.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::BoardFetcher;
use super::models::{Board, BoardId};
use super::store::SnapshotStore;
use super::ws::{ChannelConnector, ChannelEnd, Signal, SignalSource};
use crate::errors::{BoardError, ViewError};

/// How responses from overlapping fetches are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrdering {
    /// Apply every successful response as it completes.
    #[default]
    LastProcessedWins,
    /// Drop responses issued before the last applied one.
    DiscardStale,
}

impl std::fmt::Display for FetchOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchOrdering::LastProcessedWins => write!(f, "last_processed_wins"),
            FetchOrdering::DiscardStale => write!(f, "discard_stale"),
        }
    }
}

/// Reconnection after the notification channel is lost.
///
/// `max_attempts = 0` (the default) disables reconnection: the loss is
/// reported and the view keeps its last snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl ReconnectPolicy {
    pub fn enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before reconnect attempt `attempt` (0-based), or `None` when
    /// the attempts are used up.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Some(Duration::from_millis(ms))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub ordering: FetchOrdering,
    pub reconnect: ReconnectPolicy,
}

/// Progress notifications published by a running view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ChannelOpened,
    Replaced { generation: u64, seq: u64 },
    StaleDiscarded { seq: u64 },
    RefreshFailed { seq: u64, message: String },
    ChannelLost { reason: String, will_retry: bool },
    ChannelRestored { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Initial,
    Signal,
    Manual,
    CatchUp,
}

type Handshake = BoxFuture<'static, Result<Box<dyn SignalSource>, BoardError>>;

struct FetchOutcome {
    seq: u64,
    kind: FetchKind,
    result: Result<Board, BoardError>,
}

#[derive(Default)]
struct LoopState {
    next_seq: u64,
    last_applied: Option<u64>,
    fetched: bool,
    reconnect_attempt: u32,
    reconnect_at: Option<Instant>,
}

impl LoopState {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn is_stale(&self, seq: u64) -> bool {
        self.last_applied.is_some_and(|last| seq < last)
    }
}

/// Controls a running [`BoardView`] from outside the loop.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    cancel: CancellationToken,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl ViewHandle {
    /// Tear the view down. The loop closes its channel and returns.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask for a refetch outside the signal path. Returns `false` once the
    /// view is gone.
    pub fn refresh(&self) -> bool {
        self.refresh_tx.send(()).is_ok()
    }
}

/// One open board: a snapshot store kept current by the notification channel.
pub struct BoardView {
    board_id: BoardId,
    fetcher: Arc<dyn BoardFetcher>,
    connector: Arc<dyn ChannelConnector>,
    store: SnapshotStore,
    events: broadcast::Sender<ViewEvent>,
    options: ViewOptions,
    cancel: CancellationToken,
    refresh_tx: mpsc::UnboundedSender<()>,
    refresh_rx: mpsc::UnboundedReceiver<()>,
}

impl BoardView {
    pub fn new(
        board_id: BoardId,
        fetcher: Arc<dyn BoardFetcher>,
        connector: Arc<dyn ChannelConnector>,
        options: ViewOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        Self {
            board_id,
            fetcher,
            connector,
            store: SnapshotStore::new(),
            events,
            options,
            cancel: CancellationToken::new(),
            refresh_tx,
            refresh_rx,
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn store(&self) -> SnapshotStore {
        self.store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    pub fn handle(&self) -> ViewHandle {
        ViewHandle {
            cancel: self.cancel.clone(),
            refresh_tx: self.refresh_tx.clone(),
        }
    }

    /// Run until the handle closes the view or the initial load fails.
    ///
    /// The channel is closed on every return path. In-flight fetches and a
    /// pending handshake are dropped, not awaited.
    pub async fn run(mut self) -> Result<(), ViewError> {
        let mut state = LoopState::default();
        let mut channel = None;

        let result = self.event_loop(&mut channel, &mut state).await;

        if let Some(mut channel) = channel.take() {
            channel.close().await;
        }
        result
    }

    async fn event_loop(
        &mut self,
        channel: &mut Option<Box<dyn SignalSource>>,
        state: &mut LoopState,
    ) -> Result<(), ViewError> {
        let mut in_flight: FuturesUnordered<BoxFuture<'static, FetchOutcome>> =
            FuturesUnordered::new();
        let seq = state.take_seq();
        in_flight.push(self.fetch(seq, FetchKind::Initial));
        let mut handshake = Some(self.connect());

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    info!(
                        board_id = self.board_id,
                        pending = in_flight.len(),
                        connecting = handshake.is_some(),
                        "board view closed"
                    );
                    return Ok(());
                }

                connected = next_handshake(&mut handshake) => {
                    handshake = None;
                    match connected {
                        Ok(source) => {
                            *channel = Some(source);
                            if let Some(seq) = self.channel_opened(state) {
                                in_flight.push(self.fetch(seq, FetchKind::CatchUp));
                            }
                        }
                        Err(e) => self.channel_lost(e.to_string(), true, state),
                    }
                }

                Some(outcome) = in_flight.next() => {
                    self.apply(outcome, state)?;
                }

                signal = next_signal(channel) => match signal {
                    Ok(signal) => {
                        debug!(board_id = self.board_id, kind = ?signal.kind(), "invalidation signal");
                        let seq = state.take_seq();
                        in_flight.push(self.fetch(seq, FetchKind::Signal));
                    }
                    Err(end) => {
                        channel.take();
                        let retryable = !end.is_auth_failure();
                        self.channel_lost(end.to_string(), retryable, state);
                    }
                },

                Some(()) = self.refresh_rx.recv() => {
                    let seq = state.take_seq();
                    in_flight.push(self.fetch(seq, FetchKind::Manual));
                }

                _ = wait_until(state.reconnect_at) => {
                    state.reconnect_at = None;
                    handshake = Some(self.connect());
                }
            }
        }
    }

    fn connect(&self) -> Handshake {
        let connector = Arc::clone(&self.connector);
        let board_id = self.board_id;
        debug!(board_id, "channel handshake started");
        async move { connector.connect(board_id).await }.boxed()
    }

    /// Record an open channel. Returns the seq of a catch-up fetch when
    /// signals may have been missed before it opened.
    fn channel_opened(&self, state: &mut LoopState) -> Option<u64> {
        let attempts = std::mem::take(&mut state.reconnect_attempt);
        if attempts == 0 {
            self.emit(ViewEvent::ChannelOpened);
        } else {
            info!(board_id = self.board_id, attempts, "notification channel restored");
            self.emit(ViewEvent::ChannelRestored { attempts });
        }
        // A fetch that finished before the subscription may predate a change.
        (attempts > 0 || state.fetched).then(|| state.take_seq())
    }

    fn fetch(&self, seq: u64, kind: FetchKind) -> BoxFuture<'static, FetchOutcome> {
        let fetcher = Arc::clone(&self.fetcher);
        let board_id = self.board_id;
        debug!(board_id, seq, ?kind, "fetch issued");
        async move {
            let result = fetcher.fetch_board(board_id).await;
            FetchOutcome { seq, kind, result }
        }
        .boxed()
    }

    fn apply(&self, outcome: FetchOutcome, state: &mut LoopState) -> Result<(), ViewError> {
        let FetchOutcome { seq, kind, result } = outcome;
        state.fetched = true;
        let stale = self.options.ordering == FetchOrdering::DiscardStale && state.is_stale(seq);

        match result {
            Ok(_) if stale => {
                debug!(board_id = self.board_id, seq, "stale snapshot discarded");
                self.emit(ViewEvent::StaleDiscarded { seq });
            }
            Ok(board) => {
                for violation in board.validate() {
                    warn!(board_id = self.board_id, seq, %violation, "snapshot ordering violation");
                }
                let generation = self.store.replace(board);
                state.last_applied = Some(state.last_applied.map_or(seq, |last| last.max(seq)));
                debug!(board_id = self.board_id, seq, generation, ?kind, "snapshot replaced");
                self.emit(ViewEvent::Replaced { generation, seq });
            }
            Err(source) if kind == FetchKind::Initial && !stale => {
                warn!(board_id = self.board_id, error = %source, "initial board load failed");
                return Err(ViewError::InitialLoad {
                    board_id: self.board_id,
                    source,
                });
            }
            Err(e) => {
                warn!(board_id = self.board_id, seq, ?kind, error = %e, "board refresh failed; keeping current snapshot");
                self.emit(ViewEvent::RefreshFailed {
                    seq,
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn channel_lost(&self, reason: String, retryable: bool, state: &mut LoopState) {
        let delay = if retryable {
            self.options.reconnect.backoff(state.reconnect_attempt)
        } else {
            None
        };
        let will_retry = delay.is_some();
        warn!(board_id = self.board_id, %reason, will_retry, "notification channel lost");
        if let Some(delay) = delay {
            state.reconnect_attempt += 1;
            state.reconnect_at = Some(Instant::now() + delay);
        }
        self.emit(ViewEvent::ChannelLost { reason, will_retry });
    }

    fn emit(&self, event: ViewEvent) {
        let _ = self.events.send(event); // No subscribers is fine
    }
}

async fn next_signal(channel: &mut Option<Box<dyn SignalSource>>) -> Result<Signal, ChannelEnd> {
    match channel {
        Some(channel) => channel.next_signal().await,
        None => std::future::pending().await,
    }
}

async fn next_handshake(slot: &mut Option<Handshake>) -> Result<Box<dyn SignalSource>, BoardError> {
    match slot {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
