//! CLI command implementations.
//!
//! | Module   | Commands handled                                              |
//! |----------|---------------------------------------------------------------|
//! | `auth`   | `Login`, `Register`                                           |
//! | `board`  | `Boards` (list, create, delete), `Show`                       |
//! | `edit`   | `Move`, `AddColumn`, `RenameColumn`, `DeleteColumn`, `AddCard`, `EditCard`, `DeleteCard` |
//! | `watch`  | `Watch`                                                       |
//! | `config` | `Config`                                                      |

pub mod auth;
pub mod board;
pub mod config;
pub mod edit;
pub mod watch;

pub use auth::{cmd_login, cmd_register};
pub use board::{cmd_boards, cmd_show};
pub use config::cmd_config;
pub use edit::{
    cmd_add_card, cmd_add_column, cmd_delete_card, cmd_delete_column, cmd_edit_card, cmd_move,
    cmd_rename_column,
};
pub use watch::cmd_watch;

use std::sync::Arc;

use anyhow::{Context, Result};

use boardsync::board::{Credential, HttpBoardApi, Session};
use boardsync::config::{ClientConfig, Overrides};

use crate::Cli;

/// Effective configuration: file, then environment and flags.
pub fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let (mut config, source) = ClientConfig::load_or_default(cli.config.as_deref())?;
    match &source {
        Some(path) => tracing::debug!(path = %path.display(), "config loaded"),
        None => tracing::debug!("no config file; using defaults"),
    }
    config.apply(&Overrides {
        api_url: cli.api_url.clone(),
        ws_url: cli.ws_url.clone(),
        request_timeout_secs: cli.timeout,
    });
    Ok(config)
}

/// Build an authenticated session. Fails without a token.
pub fn session(cli: &Cli, config: &ClientConfig) -> Result<Arc<Session>> {
    let token = cli.token.as_deref().unwrap_or_default();
    let credential = Credential::new(token)
        .context("No access token. Run `boardsync login` and pass --token or set BOARDSYNC_TOKEN")?;
    Ok(Arc::new(Session::new(config, credential)?))
}

pub fn board_api(cli: &Cli) -> Result<(ClientConfig, Arc<HttpBoardApi>)> {
    let config = client_config(cli)?;
    let session = session(cli, &config)?;
    Ok((config, Arc::new(HttpBoardApi::new(session))))
}
