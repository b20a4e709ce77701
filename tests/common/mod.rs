//! In-process fake of the board backend: REST endpoints plus the per-board
//! WebSocket broadcast, backed by one in-memory board.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use boardsync::board::models::*;
use boardsync::board::{Credential, Session};
use boardsync::config::ClientConfig;

pub const TOKEN: &str = "test-token";
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "secret";
pub const BOARD_ID: BoardId = 1;
/// A board that exists but the test user is not a member of.
pub const FOREIGN_BOARD_ID: BoardId = 2;
pub const TODO: ColumnId = 10;
pub const DONE: ColumnId = 20;

struct Db {
    board: Board,
    /// Boards made through `POST /boards/`; listed but never opened.
    created: Vec<BoardSummary>,
    next_id: i64,
}

struct AppState {
    db: Mutex<Db>,
    signals: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
    fetches: AtomicUsize,
    fail_fetches: AtomicBool,
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<AppState>,
}

fn card(id: CardId, column_id: ColumnId, title: &str, position: i32) -> Card {
    Card {
        id,
        column_id,
        title: title.into(),
        description: None,
        position,
        assigned_to: None,
        created_by: Some(1),
    }
}

/// Todo: [card 1 "Write tests", card 2 "Fix bug"], Done: []
fn seed_board() -> Board {
    Board {
        id: BOARD_ID,
        title: "Team board".into(),
        owner_id: 1,
        created_at: Some("2024-05-01T10:00:00".into()),
        columns: vec![
            Column {
                id: TODO,
                title: "Todo".into(),
                position: 0,
                cards: vec![card(1, TODO, "Write tests", 0), card(2, TODO, "Fix bug", 1)],
            },
            Column {
                id: DONE,
                title: "Done".into(),
                position: 1,
                cards: vec![],
            },
        ],
        members: vec![Membership {
            user_id: 1,
            role: MemberRole::Owner,
            display_name: "Ada".into(),
        }],
    }
}

impl FakeBackend {
    pub async fn spawn() -> Self {
        let (signals, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);
        let state = Arc::new(AppState {
            db: Mutex::new(Db {
                board: seed_board(),
                created: vec![],
                next_id: 100,
            }),
            signals,
            kick,
            fetches: AtomicUsize::new(0),
            fail_fetches: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/login", post(login))
            .route("/register", post(register))
            .route("/boards/", get(list_boards).post(create_board))
            .route("/boards/{board_id}", get(get_board).delete(delete_board))
            .route("/boards/{board_id}/columns/", post(create_column))
            .route(
                "/boards/{board_id}/columns/{column_id}",
                put(update_column).delete(delete_column),
            )
            .route("/boards/{board_id}/cards/", post(create_card))
            .route(
                "/boards/{board_id}/cards/{card_id}",
                put(update_card).delete(delete_card),
            )
            .route("/boards/{board_id}/cards/{card_id}/move", put(move_card))
            .route("/ws/{board_id}", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.api_url = self.api_url();
        config.server.ws_url = self.ws_url();
        config.server.request_timeout_secs = Some(5);
        config
    }

    pub fn session(&self) -> Arc<Session> {
        self.session_with(TOKEN)
    }

    pub fn session_with(&self, token: &str) -> Arc<Session> {
        Arc::new(Session::new(&self.config(), Credential::new(token).unwrap()).unwrap())
    }

    pub fn board(&self) -> Board {
        self.state.db.lock().unwrap().board.clone()
    }

    /// Number of successful `GET /boards/{id}` calls so far.
    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.state.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Broadcast a signal without changing the board.
    pub fn notify(&self, kind: &str) {
        broadcast(&self.state, kind, json!({}));
    }

    /// Drop every open WebSocket without a close frame.
    pub fn drop_connections(&self) {
        let _ = self.state.kick.send(());
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.signals.receiver_count()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

/// Common preamble: bearer check and board membership.
fn check_access(headers: &HeaderMap, board_id: BoardId) -> Result<(), Response> {
    if !authorized(headers) {
        return Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"));
    }
    match board_id {
        BOARD_ID => Ok(()),
        FOREIGN_BOARD_ID => Err(detail(StatusCode::FORBIDDEN, "Not a member of this board")),
        _ => Err(detail(StatusCode::NOT_FOUND, "Board not found")),
    }
}

fn broadcast(state: &AppState, kind: &str, data: serde_json::Value) {
    let _ = state
        .signals
        .send(json!({ "type": kind, "data": data }).to_string());
}

fn renumber(column: &mut Column) {
    for (i, card) in column.cards.iter_mut().enumerate() {
        card.position = i as i32;
        card.column_id = column.id;
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login(Form(form): Form<LoginForm>) -> Response {
    if form.username == EMAIL && form.password == PASSWORD {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect email or password")
    }
}

async fn register(Json(req): Json<RegisterRequest>) -> Response {
    if req.email == EMAIL {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    Json(User {
        id: 2,
        email: req.email,
        display_name: req.display_name,
    })
    .into_response()
}

async fn list_boards(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    let db = state.db.lock().unwrap();
    let mut boards = vec![BoardSummary {
        id: db.board.id,
        title: db.board.title.clone(),
        owner_id: db.board.owner_id,
        created_at: db.board.created_at.clone(),
    }];
    boards.extend(db.created.iter().cloned());
    Json(boards).into_response()
}

async fn create_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBoardRequest>,
) -> Response {
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    let mut db = state.db.lock().unwrap();
    let id = db.next_id;
    db.next_id += 1;
    let board = BoardSummary {
        id,
        title: req.title,
        owner_id: 1,
        created_at: Some("2024-05-02T09:00:00".into()),
    };
    db.created.push(board.clone());
    Json(board).into_response()
}

async fn delete_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<BoardId>,
) -> Response {
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    if board_id == FOREIGN_BOARD_ID {
        return detail(StatusCode::FORBIDDEN, "Insufficient permissions");
    }
    let mut db = state.db.lock().unwrap();
    let before = db.created.len();
    db.created.retain(|b| b.id != board_id);
    if db.created.len() == before {
        return detail(StatusCode::NOT_FOUND, "Board not found");
    }
    Json(json!({ "detail": "Board deleted" })).into_response()
}

async fn get_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<BoardId>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    if state.fail_fetches.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
    }
    state.fetches.fetch_add(1, Ordering::SeqCst);
    Json(state.db.lock().unwrap().board.clone()).into_response()
}

async fn create_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<BoardId>,
    Json(req): Json<CreateColumnRequest>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    let column = {
        let mut db = state.db.lock().unwrap();
        let id = db.next_id;
        db.next_id += 1;
        let column = Column {
            id,
            title: req.title,
            position: db.board.columns.len() as i32,
            cards: vec![],
        };
        db.board.columns.push(column.clone());
        column
    };
    broadcast(&state, "column_created", json!({ "column_id": column.id }));
    (StatusCode::CREATED, Json(column)).into_response()
}

async fn update_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((board_id, column_id)): Path<(BoardId, ColumnId)>,
    Json(req): Json<UpdateColumnRequest>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    let updated = {
        let mut db = state.db.lock().unwrap();
        let Some(column) = db.board.columns.iter_mut().find(|c| c.id == column_id) else {
            return detail(StatusCode::NOT_FOUND, "Column not found");
        };
        if let Some(title) = req.title {
            column.title = title;
        }
        Column {
            cards: vec![],
            ..column.clone()
        }
    };
    broadcast(&state, "column_updated", json!({ "column_id": column_id }));
    Json(updated).into_response()
}

async fn delete_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((board_id, column_id)): Path<(BoardId, ColumnId)>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    {
        let mut db = state.db.lock().unwrap();
        let before = db.board.columns.len();
        db.board.columns.retain(|c| c.id != column_id);
        if db.board.columns.len() == before {
            return detail(StatusCode::NOT_FOUND, "Column not found");
        }
        for (i, column) in db.board.columns.iter_mut().enumerate() {
            column.position = i as i32;
        }
    }
    broadcast(&state, "column_deleted", json!({ "column_id": column_id }));
    Json(json!({ "detail": "Column deleted" })).into_response()
}

async fn create_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<BoardId>,
    Json(req): Json<CreateCardRequest>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    let card = {
        let mut db = state.db.lock().unwrap();
        let id = db.next_id;
        db.next_id += 1;
        let Some(column) = db.board.columns.iter_mut().find(|c| c.id == req.column_id) else {
            return detail(StatusCode::NOT_FOUND, "Column not found");
        };
        let card = Card {
            id,
            column_id: column.id,
            title: req.title,
            description: req.description,
            position: column.cards.len() as i32,
            assigned_to: None,
            created_by: Some(1),
        };
        column.cards.push(card.clone());
        card
    };
    broadcast(&state, "card_created", json!({ "card_id": card.id }));
    (StatusCode::CREATED, Json(card)).into_response()
}

async fn update_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((board_id, card_id)): Path<(BoardId, CardId)>,
    Json(req): Json<UpdateCardRequest>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    let updated = {
        let mut db = state.db.lock().unwrap();
        let Some(card) = db
            .board
            .columns
            .iter_mut()
            .flat_map(|c| c.cards.iter_mut())
            .find(|c| c.id == card_id)
        else {
            return detail(StatusCode::NOT_FOUND, "Card not found");
        };
        if let Some(title) = req.title {
            card.title = title;
        }
        if let Some(description) = req.description {
            card.description = Some(description);
        }
        card.clone()
    };
    broadcast(&state, "card_updated", json!({ "card_id": card_id }));
    Json(updated).into_response()
}

async fn delete_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((board_id, card_id)): Path<(BoardId, CardId)>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    {
        let mut db = state.db.lock().unwrap();
        let Some(column) = db
            .board
            .columns
            .iter_mut()
            .find(|c| c.cards.iter().any(|card| card.id == card_id))
        else {
            return detail(StatusCode::NOT_FOUND, "Card not found");
        };
        column.cards.retain(|c| c.id != card_id);
        renumber(column);
    }
    broadcast(&state, "card_deleted", json!({ "card_id": card_id }));
    Json(json!({ "detail": "Card deleted" })).into_response()
}

/// Moves and renumbers both affected columns so positions stay `0..n`.
async fn move_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((board_id, card_id)): Path<(BoardId, CardId)>,
    Json(req): Json<MoveCardRequest>,
) -> Response {
    if let Err(resp) = check_access(&headers, board_id) {
        return resp;
    }
    let moved = {
        let mut db = state.db.lock().unwrap();
        if !db.board.columns.iter().any(|c| c.id == req.column_id) {
            return detail(StatusCode::NOT_FOUND, "Target column not found");
        }
        let Some((from, index)) = db.board.columns.iter().enumerate().find_map(|(ci, c)| {
            c.cards.iter().position(|card| card.id == card_id).map(|i| (ci, i))
        }) else {
            return detail(StatusCode::NOT_FOUND, "Card not found");
        };
        let card = db.board.columns[from].cards.remove(index);
        renumber(&mut db.board.columns[from]);

        let Some(target) = db.board.columns.iter_mut().find(|c| c.id == req.column_id) else {
            return detail(StatusCode::NOT_FOUND, "Target column not found");
        };
        let at = (req.position.max(0) as usize).min(target.cards.len());
        target.cards.insert(at, card);
        renumber(target);
        target.cards[at].clone()
    };
    broadcast(
        &state,
        "card_moved",
        json!({ "card_id": card_id, "column_id": moved.column_id, "position": moved.position }),
    );
    Json(moved).into_response()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let token_ok = params.get("token").is_some_and(|t| t == TOKEN);
    let close_code = if !token_ok {
        Some((4001, "Invalid token"))
    } else if board_id != BOARD_ID {
        Some((4003, "Not a member of this board"))
    } else {
        None
    };
    // Subscribe before the upgrade so no broadcast after the handshake is missed.
    let rx = state.signals.subscribe();
    let kick = state.kick.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, kick, close_code))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<String>,
    mut kick: broadcast::Receiver<()>,
    close_code: Option<(u16, &'static str)>,
) {
    if let Some((code, reason)) = close_code {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
        return;
    }

    loop {
        tokio::select! {
            _ = kick.recv() => return,
            msg = rx.recv() => match msg {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
