use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use boardsync::board::{BoardId, CardId, ColumnId};

mod cmd;

#[derive(Parser)]
#[command(name = "boardsync")]
#[command(version, about = "Shared Kanban board client")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Path to a boardsync.toml. Defaults to ./boardsync.toml, then the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// REST base URL. Overrides [server].api_url.
    #[arg(long, env = "BOARDSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// WebSocket base URL. Overrides [server].ws_url.
    #[arg(long, env = "BOARDSYNC_WS_URL", global = true)]
    pub ws_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Bearer token from `boardsync login`
    #[arg(long, env = "BOARDSYNC_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Exchange email and password for an access token
    Login {
        email: String,
        #[arg(long, env = "BOARDSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        email: String,
        #[arg(long, env = "BOARDSYNC_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: String,
    },
    /// List, create or delete boards
    Boards {
        #[command(subcommand)]
        command: Option<BoardsCommands>,
    },
    /// Print one board
    Show { board: BoardId },
    /// Follow a board live, printing it after every change
    Watch { board: BoardId },
    /// Drop a card onto a column or another card, e.g. `move 3 card-12 column-4`
    Move {
        board: BoardId,
        /// Dragged card (`card-{id}`)
        dragged: String,
        /// Drop target (`card-{id}` or `column-{id}`)
        target: String,
    },
    /// Add a column at the end of the board
    AddColumn { board: BoardId, title: String },
    RenameColumn {
        board: BoardId,
        column: ColumnId,
        title: String,
    },
    DeleteColumn { board: BoardId, column: ColumnId },
    /// Add a card at the end of a column
    AddCard {
        board: BoardId,
        column: ColumnId,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    EditCard {
        board: BoardId,
        card: CardId,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    DeleteCard { board: BoardId, card: CardId },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardsCommands {
    /// List the boards you are a member of
    List,
    /// Create a board you own
    Create { title: String },
    /// Delete a board (owner only)
    Delete { board: BoardId },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print the config file locations that are searched
    Path,
    /// Write a default boardsync.toml to the current directory
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_filter = if verbose { "boardsync=debug" } else { "boardsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match &cli.command {
        Commands::Login { email, password } => cmd::cmd_login(&cli, email, password).await?,
        Commands::Register {
            email,
            password,
            display_name,
        } => cmd::cmd_register(&cli, email, password, display_name).await?,
        Commands::Boards { command } => cmd::cmd_boards(&cli, command.clone()).await?,
        Commands::Show { board } => cmd::cmd_show(&cli, *board).await?,
        Commands::Watch { board } => cmd::cmd_watch(&cli, *board).await?,
        Commands::Move {
            board,
            dragged,
            target,
        } => cmd::cmd_move(&cli, *board, dragged, target).await?,
        Commands::AddColumn { board, title } => cmd::cmd_add_column(&cli, *board, title).await?,
        Commands::RenameColumn {
            board,
            column,
            title,
        } => cmd::cmd_rename_column(&cli, *board, *column, title).await?,
        Commands::DeleteColumn { board, column } => {
            cmd::cmd_delete_column(&cli, *board, *column).await?
        }
        Commands::AddCard {
            board,
            column,
            title,
            description,
        } => cmd::cmd_add_card(&cli, *board, *column, title, description.as_deref()).await?,
        Commands::EditCard {
            board,
            card,
            title,
            description,
        } => {
            cmd::cmd_edit_card(&cli, *board, *card, title.as_deref(), description.as_deref())
                .await?
        }
        Commands::DeleteCard { board, card } => cmd::cmd_delete_card(&cli, *board, *card).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
