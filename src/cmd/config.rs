//! Configuration view and setup: `boardsync config`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use boardsync::config::{ClientConfig, LOCAL_CONFIG_FILE};

use super::client_config;
use crate::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let (_, source) = ClientConfig::load_or_default(cli.config.as_deref())?;
            let config = client_config(cli)?;

            println!("boardsync configuration");
            println!("=======================");
            match &source {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("Config file: none (using defaults)"),
            }
            println!(
                "Credential: {}",
                if cli.token.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                    "set"
                } else {
                    "not set"
                }
            );
            println!();
            println!("Effective values (with env/CLI overrides):");
            print!("{}", config.to_toml()?);
        }
        Some(ConfigCommands::Path) => {
            if let Some(path) = &cli.config {
                println!("{} (--config)", path.display());
            }
            println!("{}", LOCAL_CONFIG_FILE);
            match ClientConfig::default_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no user config directory on this platform)"),
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = PathBuf::from(LOCAL_CONFIG_FILE);
            if path.exists() && !force {
                println!("{} already exists. Pass --force to overwrite it.", path.display());
                return Ok(());
            }
            let content = ClientConfig::default().to_toml()?;
            std::fs::write(&path, content)
                .with_context(|| format!("Failed to write config file: {}", path.display()))?;
            println!("Created {}", path.display());
        }
    }

    Ok(())
}
