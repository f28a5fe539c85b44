// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Inactivity Monitor
//!
//! Background task that wipes the key cache once the session has gone
//! without user interaction for longer than the key TTL.
//!
//! Every `check_interval` (default 60 s) the monitor:
//! 1. Drops session keys older than the TTL.
//! 2. Compares the time since the last recorded interaction against the
//!    TTL and, if exceeded, clears the private key and all session keys.
//!
//! Interactions are reported by the UI through
//! [`KeyManager::record_interaction`].
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` so the owning session can stop
//! the monitor on logout.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{KeyManager, PublicKeyDirectory};

/// Floor for the check period; a zero interval would spin.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub struct InactivityMonitor<D> {
    manager: Arc<KeyManager<D>>,
    check_interval: Duration,
}

impl<D: PublicKeyDirectory> InactivityMonitor<D> {
    pub fn new(manager: Arc<KeyManager<D>>) -> Self {
        let check_interval = manager.config().check_interval.max(MIN_CHECK_INTERVAL);
        Self {
            manager,
            check_interval,
        }
    }

    /// Run the check loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(monitor.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            "Inactivity monitor starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Inactivity monitor shutting down");
                    return;
                }
            }
            self.check();
        }
    }

    /// One check: purge stale session keys, then wipe everything if idle.
    ///
    /// Returns true when the full wipe ran.
    pub fn check(&self) -> bool {
        let purged = self.manager.purge_expired_session_keys();
        if purged > 0 {
            debug!(count = purged, "Expired session keys dropped");
        }
        self.manager.expire_if_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{KeyManagerConfig, KeyStore, MemoryKeyStore, StaticKeyDirectory};
    use crate::crypto::sealed::wrap_private_key;
    use crate::crypto::IdentityKeyPair;

    const PASSWORD: &str = "pw";

    async fn loaded_manager() -> Arc<KeyManager<StaticKeyDirectory>> {
        let store = Arc::new(MemoryKeyStore::new());
        let pair = IdentityKeyPair::generate();
        store
            .save("alice", &wrap_private_key(pair.private_key(), PASSWORD).unwrap())
            .unwrap();
        let directory = StaticKeyDirectory::new();
        directory.insert("chat-1", IdentityKeyPair::generate().public);
        let manager = Arc::new(KeyManager::new(store, directory, KeyManagerConfig::default()));
        manager
            .get_decrypted_private_key("alice", Some(PASSWORD))
            .await
            .unwrap();
        manager.get_shared_key("chat-1", "alice").await.unwrap();
        manager
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_wiped_and_key_rederived() {
        let manager = loaded_manager().await;
        let before = manager.get_shared_key("chat-1", "alice").await.unwrap();
        let monitor = InactivityMonitor::new(manager.clone());

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        assert!(!monitor.check());
        assert_eq!(manager.cached_session_keys(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert!(monitor.check());
        assert!(!manager.has_private_key());
        assert_eq!(manager.cached_session_keys(), 0);

        manager
            .get_decrypted_private_key("alice", Some(PASSWORD))
            .await
            .unwrap();
        let after = manager.get_shared_key("chat-1", "alice").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn zero_check_interval_is_raised_to_the_floor() {
        let manager = Arc::new(KeyManager::new(
            Arc::new(MemoryKeyStore::new()),
            StaticKeyDirectory::new(),
            KeyManagerConfig {
                check_interval: Duration::ZERO,
                ..KeyManagerConfig::default()
            },
        ));
        let monitor = InactivityMonitor::new(manager);
        assert_eq!(monitor.check_interval, MIN_CHECK_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn interaction_postpones_the_wipe() {
        let manager = loaded_manager().await;
        let monitor = InactivityMonitor::new(manager.clone());

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        manager.record_interaction();
        tokio::time::advance(Duration::from_secs(2 * 60)).await;

        assert!(!monitor.check());
        assert!(manager.has_private_key());
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_wipes_and_stops_on_cancel() {
        let manager = loaded_manager().await;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(InactivityMonitor::new(manager.clone()).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(6 * 60 + 1)).await;
        assert!(!manager.has_private_key());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
