// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Server Storage
//!
//! A single redb file under `DATA_DIR` holds everything the server keeps:
//!
//! ```text
//! {DATA_DIR}/chat.redb
//!   public_keys     user_id -> base64 public key (first writer wins)
//!   chats           chat_id -> two participants
//!   chat_pairs      participant pair -> chat_id
//!   messages        chat_id|seq -> storage-layer ciphertext + metadata
//!   meta            counters
//!   refresh_tokens  sha256(token) -> revocation record
//!   users           username -> account with password hash
//! ```
//!
//! Message content only ever reaches this module wrapped in the storage
//! layer (see [`crate::crypto::envelope`]); the end-to-end layer inside it
//! is opaque to the server.

pub mod chats;
pub mod database;
pub mod keys;
pub mod messages;
pub mod models;
pub mod tokens;
pub mod users;

pub use database::ChatDatabase;
pub use messages::SavedMessage;
pub use models::{RefreshTokenRecord, StoredChat, StoredMessage, StoredUser};
pub use tokens::ConsumeOutcome;

/// Database file name under the data directory.
pub const DATABASE_FILE: &str = "chat.redb";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("user {user_id} is not a participant of chat {chat_id}")]
    NotParticipant { user_id: String, chat_id: String },

    #[error("invalid data: {0}")]
    Invalid(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
