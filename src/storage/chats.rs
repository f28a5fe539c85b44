// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Two-party chats.

use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable};
use uuid::Uuid;

use super::database::{pair_key, ChatDatabase, CHATS, CHAT_PAIRS};
use super::{StorageError, StorageResult, StoredChat};

impl ChatDatabase {
    /// Start a chat between two users, or return the one they already share.
    ///
    /// The boolean is true when a new chat was created.
    pub fn create_chat(&self, user_a: &str, user_b: &str) -> StorageResult<(StoredChat, bool)> {
        if user_a.is_empty() || user_b.is_empty() {
            return Err(StorageError::Invalid("participant id is empty".into()));
        }
        if user_a == user_b {
            return Err(StorageError::Invalid(
                "a chat needs two distinct participants".into(),
            ));
        }

        let pair = pair_key(user_a, user_b);
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut pairs = write_txn.open_table(CHAT_PAIRS)?;
            let mut chats = write_txn.open_table(CHATS)?;

            let existing_id = pairs.get(pair.as_str())?.map(|v| v.value().to_string());
            match existing_id {
                Some(chat_id) => {
                    let bytes = chats
                        .get(chat_id.as_str())?
                        .ok_or_else(|| StorageError::NotFound(format!("chat {chat_id}")))?
                        .value()
                        .to_vec();
                    (serde_json::from_slice::<StoredChat>(&bytes)?, false)
                }
                None => {
                    let chat = StoredChat {
                        id: Uuid::new_v4().to_string(),
                        participants: [user_a.to_string(), user_b.to_string()],
                        created_at: Utc::now(),
                    };
                    let json = serde_json::to_vec(&chat)?;
                    chats.insert(chat.id.as_str(), json.as_slice())?;
                    pairs.insert(pair.as_str(), chat.id.as_str())?;
                    (chat, true)
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    pub fn get_chat(&self, chat_id: &str) -> StorageResult<Option<StoredChat>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHATS)?;
        match table.get(chat_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Fetch a chat and check that `user_id` takes part in it.
    pub fn chat_for_participant(&self, chat_id: &str, user_id: &str) -> StorageResult<StoredChat> {
        let chat = self
            .get_chat(chat_id)?
            .ok_or_else(|| StorageError::NotFound(format!("chat {chat_id}")))?;
        if !chat.is_participant(user_id) {
            return Err(StorageError::NotParticipant {
                user_id: user_id.to_string(),
                chat_id: chat_id.to_string(),
            });
        }
        Ok(chat)
    }
}
