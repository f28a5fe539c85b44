// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Refresh Token Sweeper
//!
//! Background task that deletes expired and revoked refresh token records
//! every `interval` (default 24 h), whether or not anyone is logging in.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::TokenService;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct TokenSweeper {
    tokens: Arc<TokenService>,
    interval: Duration,
}

impl TokenSweeper {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Refresh token sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Refresh token sweeper shutting down");
                return;
            }

            self.sweep_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Refresh token sweeper shutting down");
                    return;
                }
            }
        }
    }

    async fn sweep_step(&self) {
        let tokens = Arc::clone(&self.tokens);
        match tokio::task::spawn_blocking(move || tokens.sweep()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => info!(removed, "Swept refresh token records"),
            Ok(Err(e)) => warn!(error = %e, "Refresh token sweep failed"),
            Err(e) => warn!(error = %e, "Refresh token sweep task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::test_token_service;
    use crate::auth::{AuthenticatedUser, Role};
    use crate::storage::database::temp_db;

    #[tokio::test]
    async fn sweeps_on_start_and_stops_on_cancel() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let tokens = Arc::new(test_token_service(Arc::clone(&db)));
        let pair = tokens
            .issue_tokens(&AuthenticatedUser::new("alice", Role::User))
            .unwrap();
        tokens.revoke(&pair.refresh_token).unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            TokenSweeper::new(Arc::clone(&tokens))
                .with_interval(Duration::from_millis(10))
                .run(shutdown.clone()),
        );

        let hash = crate::auth::tokens::token_hash(&pair.refresh_token);
        for _ in 0..100 {
            if db.get_refresh_token(&hash).unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(db.get_refresh_token(&hash).unwrap().is_none());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
