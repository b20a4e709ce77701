use std::sync::Arc;

use tracing::info;

use super::api::BoardCommands;
use super::models::*;
use super::resolver::{self, MoveCommand};
use crate::errors::BoardError;

/// Trim a user-supplied title and reject it when nothing is left.
pub fn validate_title(raw: &str) -> Result<String, BoardError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(BoardError::Validation {
            field: "title",
            message: "must not be empty".into(),
        });
    }
    Ok(title.to_string())
}

/// Sends user commands for one board.
///
/// Results are returned to the caller but never applied locally: the
/// snapshot only changes when the notification channel triggers a refetch.
#[derive(Clone)]
pub struct CommandDispatcher {
    board_id: BoardId,
    commands: Arc<dyn BoardCommands>,
}

impl CommandDispatcher {
    pub fn new(board_id: BoardId, commands: Arc<dyn BoardCommands>) -> Self {
        Self { board_id, commands }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub async fn move_card(&self, cmd: MoveCommand) -> Result<Card, BoardError> {
        info!(
            board_id = self.board_id,
            card_id = cmd.card_id,
            column_id = cmd.target.column_id,
            position = cmd.target.position,
            "move card"
        );
        self.commands
            .move_card(self.board_id, cmd.card_id, &cmd.request())
            .await
    }

    /// Resolve a drag-end event against `snapshot` and send the move.
    ///
    /// Returns `Ok(None)` when the drop does not resolve; nothing is sent.
    pub async fn drop_card(
        &self,
        active: &str,
        over: &str,
        snapshot: &Board,
    ) -> Result<Option<Card>, BoardError> {
        match resolver::resolve(active, over, snapshot) {
            Some(cmd) => self.move_card(cmd).await.map(Some),
            None => {
                info!(board_id = self.board_id, active, over, "drop ignored");
                Ok(None)
            }
        }
    }

    pub async fn add_column(&self, title: &str) -> Result<Column, BoardError> {
        let req = CreateColumnRequest {
            title: validate_title(title)?,
        };
        info!(board_id = self.board_id, title = %req.title, "add column");
        self.commands.create_column(self.board_id, &req).await
    }

    pub async fn rename_column(
        &self,
        column_id: ColumnId,
        title: &str,
    ) -> Result<Column, BoardError> {
        let req = UpdateColumnRequest {
            title: Some(validate_title(title)?),
            position: None,
        };
        info!(board_id = self.board_id, column_id, "rename column");
        self.commands
            .update_column(self.board_id, column_id, &req)
            .await
    }

    pub async fn delete_column(&self, column_id: ColumnId) -> Result<(), BoardError> {
        info!(board_id = self.board_id, column_id, "delete column");
        self.commands.delete_column(self.board_id, column_id).await
    }

    pub async fn add_card(
        &self,
        column_id: ColumnId,
        title: &str,
        description: Option<&str>,
    ) -> Result<Card, BoardError> {
        let req = CreateCardRequest {
            title: validate_title(title)?,
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
            column_id,
        };
        info!(board_id = self.board_id, column_id, title = %req.title, "add card");
        self.commands.create_card(self.board_id, &req).await
    }

    /// Change a card's title and/or description. At least one must be given.
    pub async fn edit_card(
        &self,
        card_id: CardId,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Card, BoardError> {
        if title.is_none() && description.is_none() {
            return Err(BoardError::Validation {
                field: "card",
                message: "nothing to change".into(),
            });
        }
        let req = UpdateCardRequest {
            title: title.map(validate_title).transpose()?,
            description: description.map(String::from),
        };
        info!(board_id = self.board_id, card_id, "edit card");
        self.commands
            .update_card(self.board_id, card_id, &req)
            .await
    }

    pub async fn delete_card(&self, card_id: CardId) -> Result<(), BoardError> {
        info!(board_id = self.board_id, card_id, "delete card");
        self.commands.delete_card(self.board_id, card_id).await
    }
}
