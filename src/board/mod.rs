//! Client-side sync core for one shared Kanban board.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | `models`     | Board/column/card/membership types and request bodies  |
//! | `session`    | Backend base URLs, bearer credential, HTTP client      |
//! | `api`        | REST fetcher and command endpoints                     |
//! | `store`      | Whole-snapshot store with replacement counter          |
//! | `ws`         | Per-board WebSocket notification channel               |
//! | `reconcile`  | Fetch-on-signal loop driving the store                 |
//! | `resolver`   | Drop gesture -> `(column, position)`                   |
//! | `dispatch`   | Validated user commands sent to the backend            |
//!
//! Data flows one way: commands go out through `dispatch`, the backend
//! broadcasts a signal, `reconcile` refetches and the store is replaced.

pub mod api;
pub mod dispatch;
pub mod models;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod store;
pub mod ws;

pub use api::{BoardCommands, BoardFetcher, HttpBoardApi};
pub use dispatch::CommandDispatcher;
pub use models::{Board, BoardId, Card, CardId, Column, ColumnId};
pub use reconcile::{BoardView, FetchOrdering, ReconnectPolicy, ViewEvent, ViewHandle, ViewOptions};
pub use session::{Credential, Session};
pub use store::{Snapshot, SnapshotStore};
pub use ws::{ChannelConnector, SignalSource, WsConnector};
