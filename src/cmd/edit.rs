//! Mutation commands. Each sends one command and prints the backend's
//! answer; the board itself is not re-rendered.

use anyhow::Result;

use boardsync::board::{BoardFetcher, BoardId, CardId, ColumnId, CommandDispatcher};

use super::board::load_failed;
use super::board_api;
use crate::Cli;

fn dispatcher(cli: &Cli, board_id: BoardId) -> Result<CommandDispatcher> {
    let (_, api) = board_api(cli)?;
    Ok(CommandDispatcher::new(board_id, api))
}

/// Resolve the drop against a fresh snapshot, then send the move.
pub async fn cmd_move(cli: &Cli, board_id: BoardId, dragged: &str, target: &str) -> Result<()> {
    let (_, api) = board_api(cli)?;
    let snapshot = match api.fetch_board(board_id).await {
        Ok(board) => board,
        Err(e) => return Err(load_failed(&api, board_id, e).await),
    };
    let dispatcher = CommandDispatcher::new(board_id, api);
    match dispatcher.drop_card(dragged, target, &snapshot).await? {
        Some(card) => println!(
            "Moved card {} to column {} at position {}",
            card.id, card.column_id, card.position
        ),
        None => println!("Nothing to move: {} onto {} does not resolve", dragged, target),
    }
    Ok(())
}

pub async fn cmd_add_column(cli: &Cli, board_id: BoardId, title: &str) -> Result<()> {
    let column = dispatcher(cli, board_id)?.add_column(title).await?;
    println!("Added column {} \"{}\" at position {}", column.id, column.title, column.position);
    Ok(())
}

pub async fn cmd_rename_column(
    cli: &Cli,
    board_id: BoardId,
    column_id: ColumnId,
    title: &str,
) -> Result<()> {
    let column = dispatcher(cli, board_id)?
        .rename_column(column_id, title)
        .await?;
    println!("Renamed column {} to \"{}\"", column.id, column.title);
    Ok(())
}

pub async fn cmd_delete_column(cli: &Cli, board_id: BoardId, column_id: ColumnId) -> Result<()> {
    dispatcher(cli, board_id)?.delete_column(column_id).await?;
    println!("Deleted column {}", column_id);
    Ok(())
}

pub async fn cmd_add_card(
    cli: &Cli,
    board_id: BoardId,
    column_id: ColumnId,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    let card = dispatcher(cli, board_id)?
        .add_card(column_id, title, description)
        .await?;
    println!(
        "Added card {} \"{}\" to column {} at position {}",
        card.id, card.title, card.column_id, card.position
    );
    Ok(())
}

pub async fn cmd_edit_card(
    cli: &Cli,
    board_id: BoardId,
    card_id: CardId,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let card = dispatcher(cli, board_id)?
        .edit_card(card_id, title, description)
        .await?;
    println!("Updated card {} \"{}\"", card.id, card.title);
    Ok(())
}

pub async fn cmd_delete_card(cli: &Cli, board_id: BoardId, card_id: CardId) -> Result<()> {
    dispatcher(cli, board_id)?.delete_card(card_id).await?;
    println!("Deleted card {}", card_id);
    Ok(())
}
