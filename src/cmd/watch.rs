//! `boardsync watch`: keep one board open until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;

use boardsync::board::{BoardId, BoardView, SnapshotStore, ViewEvent, WsConnector};
use boardsync::errors::ViewError;

use super::board::{load_failed, render_board};
use super::board_api;
use crate::Cli;

pub async fn cmd_watch(cli: &Cli, board_id: BoardId) -> Result<()> {
    let (config, api) = board_api(cli)?;
    let connector = Arc::new(WsConnector::new(api.session().clone()));
    let view = BoardView::new(board_id, api.clone(), connector, config.sync.view_options());
    let store = view.store();
    let handle = view.handle();
    let mut events = view.subscribe();
    let mut task = tokio::spawn(view.run());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let finished = loop {
        tokio::select! {
            finished = &mut task => break finished,
            _ = &mut ctrl_c => {
                tracing::info!(board_id, "interrupted; closing board");
                handle.close();
                break (&mut task).await;
            }
            event = events.recv() => match event {
                Ok(event) => report(&event, &store),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "view events skipped");
                    print_current(&store);
                }
                Err(RecvError::Closed) => break (&mut task).await,
            },
        }
    };

    match finished.context("board view task failed")? {
        Ok(()) => Ok(()),
        Err(ViewError::InitialLoad { source, .. }) => Err(load_failed(&api, board_id, source).await),
    }
}

fn report(event: &ViewEvent, store: &SnapshotStore) {
    match event {
        ViewEvent::Replaced { .. } => print_current(store),
        ViewEvent::RefreshFailed { message, .. } => {
            eprintln!("Refresh failed, showing last loaded board: {}", message);
        }
        ViewEvent::ChannelLost { reason, will_retry } => {
            if *will_retry {
                eprintln!("Live updates interrupted ({}); reconnecting", reason);
            } else {
                eprintln!("Live updates stopped ({}); the board will no longer refresh", reason);
            }
        }
        ViewEvent::ChannelRestored { .. } => eprintln!("Live updates restored"),
        ViewEvent::ChannelOpened | ViewEvent::StaleDiscarded { .. } => {}
    }
}

fn print_current(store: &SnapshotStore) {
    if let Some(snapshot) = store.get() {
        println!("── revision {} ──", snapshot.generation);
        print!("{}", render_board(&snapshot));
    }
}
