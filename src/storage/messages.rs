// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message persistence. Content arrives here already wrapped in the
//! storage layer; this module never sees end-to-end ciphertext unwrapped.

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable};
use uuid::Uuid;

use super::database::{
    message_key, message_prefix, message_prefix_end, ChatDatabase, CHATS, MESSAGES, META,
    MESSAGE_SEQ,
};
use super::{StorageError, StorageResult, StoredChat, StoredMessage};

/// Result of [`ChatDatabase::save_message`].
#[derive(Debug, Clone)]
pub struct SavedMessage {
    pub message: StoredMessage,
    pub recipient_id: String,
}

impl ChatDatabase {
    /// Persist one message from `sender_id` in `chat_id`.
    ///
    /// The sender must be a participant. Returns once the write transaction
    /// has committed.
    pub fn save_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        storage_ciphertext: &str,
    ) -> StorageResult<SavedMessage> {
        let write_txn = self.db.begin_write()?;
        let message = {
            let chats = write_txn.open_table(CHATS)?;
            let chat: StoredChat = match chats.get(chat_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("chat {chat_id}"))),
            };
            let recipient_id = chat
                .peer_of(sender_id)
                .ok_or_else(|| StorageError::NotParticipant {
                    user_id: sender_id.to_string(),
                    chat_id: chat_id.to_string(),
                })?
                .to_string();

            let mut meta = write_txn.open_table(META)?;
            let seq = meta.get(MESSAGE_SEQ)?.map(|v| v.value()).unwrap_or(0) + 1;
            meta.insert(MESSAGE_SEQ, seq)?;

            let message = StoredMessage {
                id: Uuid::new_v4().to_string(),
                seq,
                chat_id: chat_id.to_string(),
                sender_id: sender_id.to_string(),
                recipient_id,
                content: storage_ciphertext.to_string(),
                created_at: Utc::now(),
            };
            let json = serde_json::to_vec(&message)?;
            let mut messages = write_txn.open_table(MESSAGES)?;
            messages.insert(message_key(chat_id, seq).as_slice(), json.as_slice())?;
            message
        };
        write_txn.commit()?;

        let recipient_id = message.recipient_id.clone();
        Ok(SavedMessage {
            message,
            recipient_id,
        })
    }

    /// All messages of a chat, oldest first.
    pub fn list_messages(&self, chat_id: &str) -> StorageResult<Vec<StoredMessage>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES)?;
        let start = message_prefix(chat_id);
        let end = message_prefix_end(chat_id);

        let mut messages = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let entry = entry?;
            messages.push(serde_json::from_slice(entry.1.value())?);
        }
        Ok(messages)
    }
}
