/// Account Service - user accounts with JWT sessions and hosted profile images
///
/// Registration with avatar and cover uploads, login, single-use refresh
/// token rotation, logout, password changes and profile updates over HTTP.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod media;
mod metrics;
mod server;
mod token;

use anyhow::Context;
use config::ServerConfig;
use context::AppContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env().context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "account_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    // Create application context
    let ctx = AppContext::new(config)
        .await
        .context("failed to initialize application context")?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ___                              __
   /   | ______________  __  ______  / /_
  / /| |/ ___/ ___/ __ \/ / / / __ \/ __/
 / ___ / /__/ /__/ /_/ / /_/ / / / / /_
/_/  |_\___/\___/\____/\__,_/_/ /_/\__/

        Account Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
