// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key directory. First writer wins; keys are never rotated in place.

use redb::{ReadableDatabase, ReadableTable};

use crate::crypto::PublicKey;

use super::database::{ChatDatabase, PUBLIC_KEYS};
use super::{StorageError, StorageResult};

impl ChatDatabase {
    /// Register `user_id`'s public key.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the user already has one.
    /// Check and insert happen in one write transaction.
    pub fn save_public_key(&self, user_id: &str, key: &PublicKey) -> StorageResult<()> {
        let encoded = key.to_base64();
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PUBLIC_KEYS)?;
            if table.get(user_id)?.is_some() {
                return Err(StorageError::AlreadyExists(format!(
                    "public key for user {user_id}"
                )));
            }
            table.insert(user_id, encoded.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_public_key(&self, user_id: &str) -> StorageResult<Option<PublicKey>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PUBLIC_KEYS)?;
        match table.get(user_id)? {
            Some(value) => {
                let key = PublicKey::from_base64(value.value())
                    .map_err(|e| StorageError::Invalid(e.to_string()))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    /// Public key of the other participant of `chat_id`, as seen by
    /// `requester`.
    pub fn recipient_public_key(
        &self,
        chat_id: &str,
        requester: &str,
    ) -> StorageResult<Option<PublicKey>> {
        let chat = self
            .get_chat(chat_id)?
            .ok_or_else(|| StorageError::NotFound(format!("chat {chat_id}")))?;
        let peer = chat.peer_of(requester).ok_or_else(|| StorageError::NotParticipant {
            user_id: requester.to_string(),
            chat_id: chat_id.to_string(),
        })?;
        self.get_public_key(peer)
    }
}
