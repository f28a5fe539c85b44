// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use sealed_chat::{
    api::router,
    auth::{TokenService, TokenSweeper},
    config::{Config, LOG_FORMAT_ENV},
    state::AppState,
    storage::{ChatDatabase, DATABASE_FILE},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let addr = config.bind_address();

    let db_path = config.data_dir.join(DATABASE_FILE);
    let db = Arc::new(ChatDatabase::open(&db_path)?);
    info!(path = %db_path.display(), "Chat database opened");

    let tokens = Arc::new(TokenService::new(config.tokens.clone(), Arc::clone(&db)));
    let state = AppState::new(
        db,
        Arc::clone(&tokens),
        Arc::new(config.storage_key),
        config.relay,
    )
    .with_secure_cookies(config.cookie_secure);

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(
        TokenSweeper::new(tokens)
            .with_interval(config.sweep_interval)
            .run(shutdown.clone()),
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Sealed chat server listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "Token sweeper task failed");
    }
    info!("Server stopped");
    Ok(())
}

/// `LOG_FORMAT=json` selects JSON lines; anything else the default format.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
