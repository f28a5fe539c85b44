// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account records for password login.

use redb::{ReadableDatabase, ReadableTable};

use super::database::{ChatDatabase, USERS};
use super::{StorageError, StorageResult, StoredUser};

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

impl ChatDatabase {
    /// Insert a new account. Usernames are unique ignoring case.
    pub fn create_user(&self, user: &StoredUser) -> StorageResult<()> {
        let key = username_key(&user.username);
        let json = serde_json::to_vec(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(key.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("user {key}")));
            }
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_user_by_username(&self, username: &str) -> StorageResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(username_key(username).as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::database::temp_db;
    use chrono::Utc;

    fn user(username: &str) -> StoredUser {
        StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: "$argon2id$placeholder".into(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let (db, _dir) = temp_db();
        db.create_user(&user("Alice")).unwrap();
        assert!(matches!(
            db.create_user(&user("alice")),
            Err(StorageError::AlreadyExists(_))
        ));
        let found = db.get_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(found.username, "Alice");
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }
}
