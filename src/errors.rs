//! Typed error hierarchy for the board client.
//!
//! Two top-level enums:
//! - `BoardError`: one backend call, channel open or client-side check
//! - `ViewError`: failures that end a board view

use thiserror::Error;

use crate::board::models::BoardId;

/// Fallback detail when the backend error body carries none.
pub const DEFAULT_DETAIL: &str = "Request failed";

/// Errors from one backend interaction.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Command rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoardError {
    /// Classify a non-success status returned by `GET /boards/{id}`.
    ///
    /// The backend answers 403 when the user is not a member; for a reader that
    /// is indistinguishable from a missing board.
    pub fn from_fetch_status(status: u16, detail: String) -> Self {
        match status {
            401 => Self::Unauthorized(detail),
            403 | 404 => Self::NotFound(detail),
            _ => Self::Transport(format!("backend returned {}: {}", status, detail)),
        }
    }

    /// Classify a non-success status returned by a mutation command.
    pub fn from_command_status(status: u16, detail: String) -> Self {
        match status {
            401 => Self::Unauthorized(detail),
            404 => Self::NotFound(detail),
            _ => Self::Rejected { status, detail },
        }
    }

    /// Errors that mean "go back to the entry screen" rather than "show the list".
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Errors that end a board view.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Initial load of board {board_id} failed: {source}")]
    InitialLoad {
        board_id: BoardId,
        #[source]
        source: BoardError,
    },
}

impl ViewError {
    pub fn board_error(&self) -> &BoardError {
        match self {
            Self::InitialLoad { source, .. } => source,
        }
    }
}
