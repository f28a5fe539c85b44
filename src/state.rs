// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::TokenService;
use crate::crypto::StorageKey;
use crate::relay::{Relay, RelaySettings};
use crate::storage::ChatDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ChatDatabase>,
    pub tokens: Arc<TokenService>,
    /// Server-only key for the storage layer of message envelopes.
    pub storage_key: Arc<StorageKey>,
    pub relay: Relay,
    /// Mark session cookies `Secure`. Off only for plain-HTTP development.
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        db: Arc<ChatDatabase>,
        tokens: Arc<TokenService>,
        storage_key: Arc<StorageKey>,
        relay_settings: RelaySettings,
    ) -> Self {
        let relay = Relay::new(Arc::clone(&db), Arc::clone(&storage_key), relay_settings);
        Self {
            db,
            tokens,
            storage_key,
            relay,
            secure_cookies: true,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    let (db, dir) = crate::storage::database::temp_db();
    let db = Arc::new(db);
    let tokens = Arc::new(crate::auth::tokens::test_token_service(Arc::clone(&db)));
    let state = AppState::new(
        db,
        tokens,
        Arc::new(StorageKey::random()),
        RelaySettings::default(),
    );
    (state, dir)
}
