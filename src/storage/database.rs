// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded chat database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `public_keys`: user_id → base64 X25519 public key
//! - `chats`: chat_id → serialized StoredChat
//! - `chat_pairs`: `low_user|high_user` → chat_id
//! - `messages`: composite key (chat_id|seq_be) → serialized StoredMessage
//! - `meta`: counter name → u64
//! - `refresh_tokens`: sha256(token) hex → serialized RefreshTokenRecord
//! - `users`: lowercased username → serialized StoredUser

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::StorageResult;

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const PUBLIC_KEYS: TableDefinition<&str, &str> = TableDefinition::new("public_keys");

pub(super) const CHATS: TableDefinition<&str, &[u8]> = TableDefinition::new("chats");

/// Participant pair → chat id. Keeps chat creation idempotent.
pub(super) const CHAT_PAIRS: TableDefinition<&str, &str> = TableDefinition::new("chat_pairs");

/// Key format: `chat_id | seq_be_bytes` so a prefix scan yields send order.
pub(super) const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

pub(super) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub(super) const REFRESH_TOKENS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("refresh_tokens");

/// Keyed by lowercased username so sign-up is case-insensitive.
pub(super) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

pub(super) const MESSAGE_SEQ: &str = "message_seq";

// =============================================================================
// ChatDatabase
// =============================================================================

/// Embedded ACID store for keys, chats, messages and refresh tokens.
pub struct ChatDatabase {
    pub(super) db: Database,
}

impl ChatDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PUBLIC_KEYS)?;
            let _ = write_txn.open_table(CHATS)?;
            let _ = write_txn.open_table(CHAT_PAIRS)?;
            let _ = write_txn.open_table(MESSAGES)?;
            let _ = write_txn.open_table(META)?;
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
            let _ = write_txn.open_table(USERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read used by the readiness check.
    pub fn ping(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let _ = table.get(MESSAGE_SEQ)?;
        Ok(())
    }
}

// =============================================================================
// Key Helpers
// =============================================================================

pub(super) fn message_key(chat_id: &str, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(chat_id.len() + 1 + 8);
    key.extend_from_slice(chat_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub(super) fn message_prefix(chat_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(chat_id.len() + 1);
    prefix.extend_from_slice(chat_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over one chat.
pub(super) fn message_prefix_end(chat_id: &str) -> Vec<u8> {
    let mut end = message_prefix(chat_id);
    end.extend_from_slice(&[0xFF; 9]);
    end
}

/// Order-independent key for a participant pair.
pub(super) fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[cfg(test)]
pub(crate) fn temp_db() -> (ChatDatabase, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = ChatDatabase::open(&dir.path().join("test.redb")).unwrap();
    (db, dir)
}
