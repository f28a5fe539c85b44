// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lookup of a chat partner's public key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::crypto::PublicKey;

use super::KeyError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of recipient public keys.
///
/// `Ok(None)` means the peer has never registered a key. Transport
/// failures are errors and are not retried here.
pub trait PublicKeyDirectory: Send + Sync {
    fn recipient_public_key(
        &self,
        chat_id: &str,
    ) -> impl Future<Output = Result<Option<PublicKey>, KeyError>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipientKeyBody {
    public_key: String,
}

/// Directory backed by `GET {base}/v1/keys/recipient/{chat_id}`.
#[derive(Clone)]
pub struct HttpKeyDirectory {
    base_url: String,
    access_token: Arc<RwLock<String>>,
    client: reqwest::Client,
}

impl HttpKeyDirectory {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self, KeyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KeyError::Directory(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: Arc::new(RwLock::new(access_token.into())),
            client,
        })
    }

    /// Swap in a refreshed access token.
    pub fn set_access_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token.into();
        }
    }

    fn bearer(&self) -> Result<String, KeyError> {
        self.access_token
            .read()
            .map(|t| t.clone())
            .map_err(|e| KeyError::Directory(e.to_string()))
    }
}

impl PublicKeyDirectory for HttpKeyDirectory {
    async fn recipient_public_key(&self, chat_id: &str) -> Result<Option<PublicKey>, KeyError> {
        let url = format!("{}/v1/keys/recipient/{}", self.base_url, chat_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await
            .map_err(|e| KeyError::Directory(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(KeyError::Directory(format!(
                "HTTP {} from key directory",
                response.status()
            )));
        }

        let body: RecipientKeyBody = response
            .json()
            .await
            .map_err(|e| KeyError::Directory(e.to_string()))?;
        let key = PublicKey::from_base64(&body.public_key)
            .map_err(|e| KeyError::Directory(e.to_string()))?;
        Ok(Some(key))
    }
}

/// Fixed chat-to-key map.
#[derive(Debug, Default, Clone)]
pub struct StaticKeyDirectory {
    keys: Arc<RwLock<HashMap<String, PublicKey>>>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, chat_id: impl Into<String>, key: PublicKey) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(chat_id.into(), key);
        }
    }
}

impl PublicKeyDirectory for StaticKeyDirectory {
    async fn recipient_public_key(&self, chat_id: &str) -> Result<Option<PublicKey>, KeyError> {
        let keys = self
            .keys
            .read()
            .map_err(|e| KeyError::Directory(e.to_string()))?;
        Ok(keys.get(chat_id).copied())
    }
}
