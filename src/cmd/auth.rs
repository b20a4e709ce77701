//! Account commands: `boardsync login`, `boardsync register`.

use anyhow::{Context, Result};

use boardsync::board::api;
use boardsync::board::models::RegisterRequest;

use super::client_config;
use crate::Cli;

/// Print the access token on stdout so it can be captured into BOARDSYNC_TOKEN.
pub async fn cmd_login(cli: &Cli, email: &str, password: &str) -> Result<()> {
    let config = client_config(cli)?;
    let token = api::login(&config, email, password)
        .await
        .context("Login failed")?;
    tracing::info!(email, token_type = %token.token_type, "logged in");
    println!("{}", token.access_token);
    Ok(())
}

pub async fn cmd_register(
    cli: &Cli,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<()> {
    let config = client_config(cli)?;
    let req = RegisterRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
        display_name: display_name.trim().to_string(),
    };
    let user = api::register(&config, &req)
        .await
        .context("Registration failed")?;
    println!("Registered {} <{}> (user {})", user.display_name, user.email, user.id);
    println!("Next: boardsync login {} --password ...", user.email);
    Ok(())
}
