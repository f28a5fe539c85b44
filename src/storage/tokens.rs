// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refresh token revocation store.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};

use super::database::{ChatDatabase, REFRESH_TOKENS};
use super::{RefreshTokenRecord, StorageResult};

/// Outcome of an attempt to consume a refresh token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The record was live and is now revoked.
    Consumed(RefreshTokenRecord),
    Revoked,
    Expired,
    Unknown,
}

impl ChatDatabase {
    pub fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            table.insert(record.token_hash.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_refresh_token(&self, token_hash: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REFRESH_TOKENS)?;
        match table.get(token_hash)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up and revoke a refresh token in a single write transaction.
    ///
    /// redb serialises write transactions, so of two concurrent calls for
    /// the same token exactly one sees it live.
    pub fn consume_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<ConsumeOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            let existing = table.get(token_hash)?.map(|v| v.value().to_vec());
            match existing {
                None => ConsumeOutcome::Unknown,
                Some(bytes) => {
                    let mut record: RefreshTokenRecord = serde_json::from_slice(&bytes)?;
                    if record.is_revoked {
                        ConsumeOutcome::Revoked
                    } else if record.is_expired(now) {
                        ConsumeOutcome::Expired
                    } else {
                        record.is_revoked = true;
                        let json = serde_json::to_vec(&record)?;
                        table.insert(token_hash, json.as_slice())?;
                        ConsumeOutcome::Consumed(record)
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Mark a token revoked. Returns false if it was unknown.
    pub fn revoke_refresh_token(&self, token_hash: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let found = {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            let existing = table.get(token_hash)?.map(|v| v.value().to_vec());
            match existing {
                Some(bytes) => {
                    let mut record: RefreshTokenRecord = serde_json::from_slice(&bytes)?;
                    if !record.is_revoked {
                        record.is_revoked = true;
                        let json = serde_json::to_vec(&record)?;
                        table.insert(token_hash, json.as_slice())?;
                    }
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(found)
    }

    /// Delete every record that is revoked or expired at `now`.
    pub fn sweep_refresh_tokens(&self, now: DateTime<Utc>) -> StorageResult<usize> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(REFRESH_TOKENS)?;
            let mut dead = Vec::new();
            for entry in table.iter()? {
                let entry = entry?;
                let record: RefreshTokenRecord = serde_json::from_slice(entry.1.value())?;
                if record.is_revoked || record.is_expired(now) {
                    dead.push(entry.0.value().to_string());
                }
            }
            for key in &dead {
                table.remove(key.as_str())?;
            }
            dead.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;

    fn record(hash: &str, expires_in: chrono::Duration) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "alice".into(),
            token_hash: hash.into(),
            expires_at: now + expires_in,
            is_revoked: false,
            created_at: now,
        }
    }

    #[test]
    fn consume_succeeds_once() {
        let (db, _dir) = temp_db();
        db.insert_refresh_token(&record("h1", chrono::Duration::days(7)))
            .unwrap();

        let first = db.consume_refresh_token("h1", Utc::now()).unwrap();
        assert!(matches!(first, ConsumeOutcome::Consumed(ref r) if r.is_revoked));
        assert_eq!(
            db.consume_refresh_token("h1", Utc::now()).unwrap(),
            ConsumeOutcome::Revoked
        );
        assert_eq!(
            db.consume_refresh_token("nope", Utc::now()).unwrap(),
            ConsumeOutcome::Unknown
        );
    }

    #[test]
    fn expired_token_is_not_consumed() {
        let (db, _dir) = temp_db();
        db.insert_refresh_token(&record("h1", chrono::Duration::seconds(-1)))
            .unwrap();
        assert_eq!(
            db.consume_refresh_token("h1", Utc::now()).unwrap(),
            ConsumeOutcome::Expired
        );
    }

    #[test]
    fn revoke_marks_record() {
        let (db, _dir) = temp_db();
        db.insert_refresh_token(&record("h1", chrono::Duration::days(1)))
            .unwrap();
        assert!(db.revoke_refresh_token("h1").unwrap());
        assert!(db.get_refresh_token("h1").unwrap().unwrap().is_revoked);
        assert!(!db.revoke_refresh_token("missing").unwrap());
    }

    #[test]
    fn sweep_removes_expired_or_revoked() {
        let (db, _dir) = temp_db();
        db.insert_refresh_token(&record("live", chrono::Duration::days(1)))
            .unwrap();
        db.insert_refresh_token(&record("expired", chrono::Duration::seconds(-5)))
            .unwrap();
        db.insert_refresh_token(&record("revoked", chrono::Duration::days(1)))
            .unwrap();
        db.revoke_refresh_token("revoked").unwrap();

        assert_eq!(db.sweep_refresh_tokens(Utc::now()).unwrap(), 2);
        assert!(db.get_refresh_token("live").unwrap().is_some());
        assert!(db.get_refresh_token("expired").unwrap().is_none());
        assert!(db.get_refresh_token("revoked").unwrap().is_none());
    }
}
