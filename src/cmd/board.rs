//! Board-level commands: `boardsync boards [list|create|delete]`, `boardsync show`.

use anyhow::{Context, Result, anyhow};

use boardsync::board::resolver::DragId;
use boardsync::board::{Board, BoardFetcher, BoardId, HttpBoardApi};
use boardsync::errors::BoardError;

use super::board_api;
use crate::{BoardsCommands, Cli};

pub async fn cmd_boards(cli: &Cli, command: Option<BoardsCommands>) -> Result<()> {
    let (_, api) = board_api(cli)?;
    match command {
        None | Some(BoardsCommands::List) => print_board_list(&api).await,
        Some(BoardsCommands::Create { title }) => {
            let board = api.create_board(&title).await.context("Failed to create board")?;
            tracing::info!(board_id = board.id, "board created");
            println!("Created board {}: {}", board.id, board.title);
            Ok(())
        }
        Some(BoardsCommands::Delete { board }) => {
            api.delete_board(board)
                .await
                .with_context(|| format!("Failed to delete board {}", board))?;
            tracing::info!(board_id = board, "board deleted");
            println!("Deleted board {}", board);
            Ok(())
        }
    }
}

pub async fn cmd_show(cli: &Cli, board_id: BoardId) -> Result<()> {
    let (_, api) = board_api(cli)?;
    match api.fetch_board(board_id).await {
        Ok(board) => {
            print!("{}", render_board(&board));
            Ok(())
        }
        Err(e) => Err(load_failed(&api, board_id, e).await),
    }
}

async fn print_board_list(api: &HttpBoardApi) -> Result<()> {
    let boards = api.list_boards().await?;
    if boards.is_empty() {
        println!("No boards.");
        return Ok(());
    }
    for board in boards {
        println!("{:>6}  {}", board.id, board.title);
    }
    Ok(())
}

/// Leaving a board that failed to load: auth problems point at `login`,
/// anything else falls back to the board list.
pub async fn load_failed(api: &HttpBoardApi, board_id: BoardId, err: BoardError) -> anyhow::Error {
    if err.is_auth_failure() {
        return anyhow!("{}. Run `boardsync login` to get a new token", err);
    }
    eprintln!("Could not open board {}: {}", board_id, err);
    eprintln!("Your boards:");
    if let Err(list_err) = print_board_list(api).await {
        tracing::warn!(error = %list_err, "board list unavailable");
    }
    anyhow!("Board {} could not be loaded", board_id)
}

/// Text rendering with the drag ids `move` accepts.
pub fn render_board(board: &Board) -> String {
    let mut out = format!("{} (board {})\n", board.title, board.id);
    if !board.members.is_empty() {
        let members: Vec<String> = board
            .members
            .iter()
            .map(|m| {
                let name = if m.display_name.is_empty() {
                    format!("user {}", m.user_id)
                } else {
                    m.display_name.clone()
                };
                if m.role.can_edit() {
                    format!("{} ({})", name, m.role.as_str())
                } else {
                    format!("{} ({}, read-only)", name, m.role.as_str())
                }
            })
            .collect();
        out.push_str(&format!("Members: {}\n", members.join(", ")));
    }
    for column in &board.columns {
        out.push_str(&format!(
            "\n[{}] {} ({})\n",
            DragId::Column(column.id),
            column.title,
            column.cards.len()
        ));
        if column.cards.is_empty() {
            out.push_str("    (empty)\n");
        }
        for card in &column.cards {
            out.push_str(&format!("    [{}] {}\n", DragId::Card(card.id), card.title));
            if let Some(description) = card.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!("        {}\n", description));
            }
        }
    }
    out
}
