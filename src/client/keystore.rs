// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local persistence of sealed private keys.
//!
//! Records are stored one per user as `encryptedPrivateKey_{user_id}.json`
//! containing `{"salt", "nonce", "data"}`. Only sealed records ever reach
//! this layer.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::crypto::SealedKeyRecord;

use super::KeyError;

/// Storage for sealed key records, keyed by user id.
pub trait KeyStore: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<SealedKeyRecord>, KeyError>;
    fn save(&self, user_id: &str, record: &SealedKeyRecord) -> Result<(), KeyError>;
    fn remove(&self, user_id: &str) -> Result<(), KeyError>;
}

/// One JSON file per user under a directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    root: PathBuf,
}

impl FileKeyStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn record_path(&self, user_id: &str) -> Result<PathBuf, KeyError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(KeyError::Store(format!("invalid user id: {user_id:?}")));
        }
        Ok(self.root.join(format!("encryptedPrivateKey_{user_id}.json")))
    }
}

fn store_err(e: impl std::fmt::Display) -> KeyError {
    KeyError::Store(e.to_string())
}

impl KeyStore for FileKeyStore {
    fn load(&self, user_id: &str) -> Result<Option<SealedKeyRecord>, KeyError> {
        let path = self.record_path(user_id)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| KeyError::CorruptRecord(e.to_string()))
    }

    fn save(&self, user_id: &str, record: &SealedKeyRecord) -> Result<(), KeyError> {
        let path = self.record_path(user_id)?;
        fs::create_dir_all(&self.root).map_err(store_err)?;

        // Write to a temp file, then rename over the old record.
        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path).map_err(store_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, record).map_err(store_err)?;
            writer.flush().map_err(store_err)?;
        }
        fs::rename(&temp_path, &path).map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<(), KeyError> {
        let path = self.record_path(user_id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_err(e)),
        }
    }
}

/// In-memory store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: Mutex<HashMap<String, SealedKeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, user_id: &str) -> Result<Option<SealedKeyRecord>, KeyError> {
        let records = self.records.lock().map_err(store_err)?;
        Ok(records.get(user_id).cloned())
    }

    fn save(&self, user_id: &str, record: &SealedKeyRecord) -> Result<(), KeyError> {
        let mut records = self.records.lock().map_err(store_err)?;
        records.insert(user_id.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<(), KeyError> {
        let mut records = self.records.lock().map_err(store_err)?;
        records.remove(user_id);
        Ok(())
    }
}
