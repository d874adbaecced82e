use clap::Parser;

mod app;
mod auth;
mod cli;
mod config;
mod mail;
mod posts;
mod state;
mod storage;
mod users;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "scribe=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let state = state::AppState::init().await?;

    match cli.command() {
        Command::Serve => app::serve(app::build_app(state)).await,
        Command::BootstrapRoles => {
            let roles = users::permissions::bootstrap_roles(state.store.as_ref()).await?;
            for role in &roles {
                tracing::info!(role = %role.name, permissions = role.permissions, default = role.is_default, "role ready");
            }
            Ok(())
        }
    }
}
