use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::dispatch::validate_title;
use super::models::*;
use super::session::{Session, build_http_client, normalize_base};
use crate::config::ClientConfig;
use crate::errors::{BoardError, DEFAULT_DETAIL};

// ── Seams ─────────────────────────────────────────────────────────────

/// Retrieves a full board snapshot.
#[async_trait]
pub trait BoardFetcher: Send + Sync {
    async fn fetch_board(&self, board_id: BoardId) -> Result<Board, BoardError>;
}

/// Mutation commands. None of them touch local state; convergence happens
/// through the notification channel and a refetch.
#[async_trait]
pub trait BoardCommands: Send + Sync {
    async fn create_column(
        &self,
        board_id: BoardId,
        req: &CreateColumnRequest,
    ) -> Result<Column, BoardError>;

    async fn update_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
        req: &UpdateColumnRequest,
    ) -> Result<Column, BoardError>;

    async fn delete_column(&self, board_id: BoardId, column_id: ColumnId)
    -> Result<(), BoardError>;

    async fn create_card(
        &self,
        board_id: BoardId,
        req: &CreateCardRequest,
    ) -> Result<Card, BoardError>;

    async fn update_card(
        &self,
        board_id: BoardId,
        card_id: CardId,
        req: &UpdateCardRequest,
    ) -> Result<Card, BoardError>;

    async fn delete_card(&self, board_id: BoardId, card_id: CardId) -> Result<(), BoardError>;

    async fn move_card(
        &self,
        board_id: BoardId,
        card_id: CardId,
        req: &MoveCardRequest,
    ) -> Result<Card, BoardError>;
}

// ── HTTP implementation ───────────────────────────────────────────────

/// REST client for the board backend. Every request carries the session's
/// bearer credential.
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    session: Arc<Session>,
}

impl HttpBoardApi {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>, BoardError> {
        let resp = self.send(Method::GET, "/boards/", None::<&()>).await?;
        decode(resp, BoardError::from_fetch_status).await
    }

    /// Create a board owned by the caller. The title is trimmed and must not
    /// be blank.
    pub async fn create_board(&self, title: &str) -> Result<BoardSummary, BoardError> {
        let req = CreateBoardRequest {
            title: validate_title(title)?,
        };
        self.command(Method::POST, "/boards/", Some(&req)).await
    }

    /// Owner only; the backend answers 403 for anyone else.
    pub async fn delete_board(&self, board_id: BoardId) -> Result<(), BoardError> {
        self.delete(&format!("/boards/{}", board_id)).await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, BoardError> {
        let url = self.session.api_url(path);
        debug!(%method, %url, "backend request");
        let mut request = self
            .session
            .authorized(self.session.http().request(method, &url));
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| BoardError::Transport(format!("request to {} failed: {}", url, e)))
    }

    async fn command<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, BoardError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let resp = self.send(method, path, body).await?;
        decode(resp, BoardError::from_command_status).await
    }

    async fn delete(&self, path: &str) -> Result<(), BoardError> {
        let resp = self.send(Method::DELETE, path, None::<&()>).await?;
        let _: serde_json::Value = decode(resp, BoardError::from_command_status).await?;
        Ok(())
    }
}

#[async_trait]
impl BoardFetcher for HttpBoardApi {
    async fn fetch_board(&self, board_id: BoardId) -> Result<Board, BoardError> {
        let resp = self
            .send(Method::GET, &format!("/boards/{}", board_id), None::<&()>)
            .await?;
        decode(resp, BoardError::from_fetch_status).await
    }
}

#[async_trait]
impl BoardCommands for HttpBoardApi {
    async fn create_column(
        &self,
        board_id: BoardId,
        req: &CreateColumnRequest,
    ) -> Result<Column, BoardError> {
        self.command(Method::POST, &format!("/boards/{}/columns/", board_id), Some(req))
            .await
    }

    async fn update_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
        req: &UpdateColumnRequest,
    ) -> Result<Column, BoardError> {
        self.command(
            Method::PUT,
            &format!("/boards/{}/columns/{}", board_id, column_id),
            Some(req),
        )
        .await
    }

    async fn delete_column(
        &self,
        board_id: BoardId,
        column_id: ColumnId,
    ) -> Result<(), BoardError> {
        self.delete(&format!("/boards/{}/columns/{}", board_id, column_id))
            .await
    }

    async fn create_card(
        &self,
        board_id: BoardId,
        req: &CreateCardRequest,
    ) -> Result<Card, BoardError> {
        self.command(Method::POST, &format!("/boards/{}/cards/", board_id), Some(req))
            .await
    }

    async fn update_card(
        &self,
        board_id: BoardId,
        card_id: CardId,
        req: &UpdateCardRequest,
    ) -> Result<Card, BoardError> {
        self.command(
            Method::PUT,
            &format!("/boards/{}/cards/{}", board_id, card_id),
            Some(req),
        )
        .await
    }

    async fn delete_card(&self, board_id: BoardId, card_id: CardId) -> Result<(), BoardError> {
        self.delete(&format!("/boards/{}/cards/{}", board_id, card_id))
            .await
    }

    async fn move_card(
        &self,
        board_id: BoardId,
        card_id: CardId,
        req: &MoveCardRequest,
    ) -> Result<Card, BoardError> {
        self.command(
            Method::PUT,
            &format!("/boards/{}/cards/{}/move", board_id, card_id),
            Some(req),
        )
        .await
    }
}

// ── Unauthenticated endpoints ─────────────────────────────────────────

/// Exchange email + password for a bearer token (`POST /login`, form body).
pub async fn login(
    config: &ClientConfig,
    email: &str,
    password: &str,
) -> Result<AccessToken, BoardError> {
    let base = normalize_base(&config.server.api_url, &["http", "https"])?;
    let client = build_http_client(config.server.request_timeout_secs)?;
    let url = format!("{}/login", base);
    let resp = client
        .post(&url)
        .form(&[("username", email), ("password", password)])
        .send()
        .await
        .map_err(|e| BoardError::Transport(format!("request to {} failed: {}", url, e)))?;
    decode(resp, BoardError::from_command_status).await
}

/// Create an account (`POST /register`).
pub async fn register(config: &ClientConfig, req: &RegisterRequest) -> Result<User, BoardError> {
    let base = normalize_base(&config.server.api_url, &["http", "https"])?;
    let client = build_http_client(config.server.request_timeout_secs)?;
    let url = format!("{}/register", base);
    let resp = client
        .post(&url)
        .json(req)
        .send()
        .await
        .map_err(|e| BoardError::Transport(format!("request to {} failed: {}", url, e)))?;
    decode(resp, BoardError::from_command_status).await
}

// ── Response decoding ─────────────────────────────────────────────────

async fn decode<T: DeserializeOwned>(
    resp: Response,
    classify: fn(u16, String) -> BoardError,
) -> Result<T, BoardError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(classify(status.as_u16(), error_detail(&body)));
    }
    resp.json::<T>()
        .await
        .map_err(|e| BoardError::Transport(format!("failed to decode response: {}", e)))
}

/// Extract the `detail` field from an error body.
///
/// Validation failures carry a list of objects rather than a string; those
/// are rendered as compact JSON.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Null) | None => DEFAULT_DETAIL.to_string(),
            Some(other) => other.to_string(),
        },
        _ => DEFAULT_DETAIL.to_string(),
    }
}
