// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side key lifecycle.
//!
//! A [`KeyManager`] belongs to one signed-in session. It holds the unsealed
//! private key and the per-chat session keys derived from it, and forgets
//! them on [`KeyManager::clear_keys`] (logout) or when the session has been
//! idle for longer than the TTL (see [`super::InactivityMonitor`]).
//!
//! ## Concurrency
//!
//! The cache sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Every wipe bumps a generation counter; a derivation that
//! started before a wipe still returns its key to its own caller but does
//! not write it back into the emptied cache. Keys are handed out as `Arc`s
//! and zeroize when the last reference drops, so a caller never observes a
//! zeroed buffer.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::sealed::{unwrap_private_key, wrap_private_key};
use crate::crypto::{derive_session_key, IdentityKeyPair, PrivateKey, PublicKey, SeedPhrase, SessionKey};

use super::{KeyError, KeyStore, PasswordPrompter, PublicKeyDirectory};

/// Default session key and inactivity TTL.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(5 * 60);
/// Default period of the inactivity check.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct KeyManagerConfig {
    /// Lifetime of a cached session key, and the idle time after which all
    /// keys are wiped.
    pub ttl: Duration,
    pub check_interval: Duration,
    /// Maximum number of cached session keys.
    pub cache_capacity: usize,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_KEY_TTL,
            check_interval: DEFAULT_CHECK_INTERVAL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

struct ResidentKey {
    user_id: String,
    key: Arc<PrivateKey>,
}

struct CachedSessionKey {
    key: Arc<SessionKey>,
    created_at: Instant,
}

struct KeyCache {
    private_key: Option<ResidentKey>,
    /// Keyed by `(user_id, chat_id)`.
    session_keys: LruCache<(String, String), CachedSessionKey>,
    generation: u64,
}

/// In-memory key custody for one session.
pub struct KeyManager<D> {
    store: Arc<dyn KeyStore>,
    directory: D,
    prompter: Option<PasswordPrompter>,
    config: KeyManagerConfig,
    cache: Mutex<KeyCache>,
    last_interaction: Mutex<Instant>,
}

impl<D: PublicKeyDirectory> KeyManager<D> {
    pub fn new(store: Arc<dyn KeyStore>, directory: D, config: KeyManagerConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            directory,
            prompter: None,
            config,
            cache: Mutex::new(KeyCache {
                private_key: None,
                session_keys: LruCache::new(capacity),
                generation: 0,
            }),
            last_interaction: Mutex::new(Instant::now()),
        }
    }

    /// Attach the channel used to ask the user for a password.
    pub fn with_prompter(mut self, prompter: PasswordPrompter) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn config(&self) -> &KeyManagerConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, KeyCache>, KeyError> {
        self.cache
            .lock()
            .map_err(|_| KeyError::Store("key cache lock poisoned".into()))
    }

    // ── Private key ───────────────────────────────────────────────────────────

    /// Return the resident private key, unsealing it first if needed.
    ///
    /// Without a password the attached prompter is asked; with no prompter
    /// this fails with [`KeyError::PasswordRequired`]. A failed unseal never
    /// caches anything.
    pub async fn get_decrypted_private_key(
        &self,
        user_id: &str,
        password: Option<&str>,
    ) -> Result<Arc<PrivateKey>, KeyError> {
        let generation = {
            let cache = self.lock_cache()?;
            if let Some(resident) = &cache.private_key {
                if resident.user_id == user_id {
                    return Ok(resident.key.clone());
                }
            }
            cache.generation
        };

        let password: Zeroizing<String> = match password.filter(|p| !p.is_empty()) {
            Some(p) => Zeroizing::new(p.to_string()),
            None => match &self.prompter {
                Some(prompter) => prompter.prompt(user_id).await?,
                None => return Err(KeyError::PasswordRequired),
            },
        };

        let store = self.store.clone();
        let owner = user_id.to_string();
        let opened = tokio::task::spawn_blocking(move || {
            let record = match store.load(&owner) {
                Ok(Some(record)) => record,
                Ok(None) => return Err(KeyError::NoEncryptedKey),
                // A record that exists but cannot be read is as unopenable as a wrong password.
                Err(KeyError::CorruptRecord(reason)) => {
                    warn!(user_id = %owner, reason = %reason, "Sealed key record is corrupt");
                    return Err(KeyError::IncorrectPassword);
                }
                Err(e) => return Err(e),
            };
            unwrap_private_key(&record, &password).map_err(KeyError::from)
        })
        .await
        .map_err(|e| KeyError::KeyDerivationFailed(e.to_string()))?;

        let key = match opened {
            Ok(key) => Arc::new(key),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Failed to unseal private key");
                return Err(err);
            }
        };

        let mut cache = self.lock_cache()?;
        if cache.generation == generation {
            cache.private_key = Some(ResidentKey {
                user_id: user_id.to_string(),
                key: key.clone(),
            });
            info!(user_id = %user_id, "Private key unsealed");
        } else {
            debug!(user_id = %user_id, "Keys wiped during unseal; not caching private key");
        }
        Ok(key)
    }

    pub fn has_private_key(&self) -> bool {
        self.lock_cache()
            .map(|c| c.private_key.is_some())
            .unwrap_or(false)
    }

    // ── Session keys ──────────────────────────────────────────────────────────

    /// Return the session key for `chat_id`, deriving it if not cached.
    pub async fn get_shared_key(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Arc<SessionKey>, KeyError> {
        let cache_key = (user_id.to_string(), chat_id.to_string());
        let generation = {
            let mut cache = self.lock_cache()?;
            let fresh = cache
                .session_keys
                .get(&cache_key)
                .filter(|entry| entry.created_at.elapsed() < self.config.ttl)
                .map(|entry| entry.key.clone());
            if let Some(key) = fresh {
                return Ok(key);
            }
            cache.session_keys.pop(&cache_key);
            cache.generation
        };

        let peer = self
            .directory
            .recipient_public_key(chat_id)
            .await?
            .ok_or(KeyError::RecipientPublicKeyNotFound)?;

        let private = self.get_decrypted_private_key(user_id, None).await?;

        let chat = chat_id.to_string();
        let key = tokio::task::spawn_blocking(move || derive_session_key(&private, &peer, &chat))
            .await
            .map_err(|e| KeyError::KeyDerivationFailed(e.to_string()))?
            .map_err(|e| KeyError::KeyDerivationFailed(e.to_string()))?;
        let key = Arc::new(key);

        let mut cache = self.lock_cache()?;
        if cache.generation == generation {
            cache.session_keys.put(
                cache_key,
                CachedSessionKey {
                    key: key.clone(),
                    created_at: Instant::now(),
                },
            );
            debug!(chat_id = %chat_id, "Session key derived");
        } else {
            debug!(chat_id = %chat_id, "Keys wiped during derivation; not caching session key");
        }
        Ok(key)
    }

    pub fn cached_session_keys(&self) -> usize {
        self.lock_cache().map(|c| c.session_keys.len()).unwrap_or(0)
    }

    /// Drop session keys older than the TTL. Returns how many were removed.
    pub fn purge_expired_session_keys(&self) -> usize {
        let Ok(mut cache) = self.lock_cache() else {
            return 0;
        };
        let ttl = self.config.ttl;
        let expired: Vec<(String, String)> = cache
            .session_keys
            .iter()
            .filter(|(_, entry)| entry.created_at.elapsed() >= ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            cache.session_keys.pop(k);
        }
        expired.len()
    }

    // ── Wiping ────────────────────────────────────────────────────────────────

    /// Forget the private key and every session key.
    ///
    /// Buffers zeroize as soon as no caller still holds them.
    pub fn clear_keys(&self) {
        match self.cache.lock() {
            Ok(mut cache) => {
                cache.private_key = None;
                cache.session_keys.clear();
                cache.generation = cache.generation.wrapping_add(1);
            }
            Err(poisoned) => {
                let mut cache = poisoned.into_inner();
                cache.private_key = None;
                cache.session_keys.clear();
                cache.generation = cache.generation.wrapping_add(1);
            }
        }
        info!("Key cache cleared");
    }

    /// Note a user interaction (input, focus, visibility change).
    pub fn record_interaction(&self) {
        if let Ok(mut last) = self.last_interaction.lock() {
            *last = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_interaction
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Wipe all keys if the session has been idle for at least the TTL.
    ///
    /// Returns true when a wipe happened.
    pub fn expire_if_idle(&self) -> bool {
        let idle = self.idle_for();
        if idle < self.config.ttl {
            return false;
        }
        let holding = self.has_private_key() || self.cached_session_keys() > 0;
        if holding {
            info!(idle_secs = idle.as_secs(), "Session idle past TTL; wiping keys");
            self.clear_keys();
        }
        holding
    }

    // ── Provisioning ──────────────────────────────────────────────────────────

    /// Generate a fresh recovery phrase and provision the key pair it
    /// derives. The phrase must be shown to the user once.
    pub async fn generate_key_pair(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<(SeedPhrase, PublicKey), KeyError> {
        let phrase = SeedPhrase::generate()?;
        let public = self.create_key_pair(user_id, password, &phrase).await?;
        Ok((phrase, public))
    }

    /// Derive the identity pair from `phrase` and `password`, seal it and
    /// store it. Returns the public key to register with the server.
    pub async fn create_key_pair(
        &self,
        user_id: &str,
        password: &str,
        phrase: &SeedPhrase,
    ) -> Result<PublicKey, KeyError> {
        if password.is_empty() {
            return Err(KeyError::PasswordRequired);
        }
        let phrase = SeedPhrase::parse(phrase.as_str())?;
        let password = Zeroizing::new(password.to_string());
        let store = self.store.clone();
        let owner = user_id.to_string();

        let pair = tokio::task::spawn_blocking(move || -> Result<IdentityKeyPair, KeyError> {
            let pair = phrase.derive_key_pair(&password)?;
            let record = wrap_private_key(pair.private_key(), &password)?;
            store.save(&owner, &record)?;
            Ok(pair)
        })
        .await
        .map_err(|e| KeyError::KeyDerivationFailed(e.to_string()))??;

        let public = pair.public;
        let private = Arc::new(pair.into_private_key());
        {
            let mut cache = self.lock_cache()?;
            cache.session_keys.clear();
            cache.generation = cache.generation.wrapping_add(1);
            cache.private_key = Some(ResidentKey {
                user_id: user_id.to_string(),
                key: private,
            });
        }
        info!(user_id = %user_id, "Key pair provisioned");
        Ok(public)
    }

    /// Re-create the key pair from a user-entered recovery phrase,
    /// replacing any sealed record already stored for `user_id`.
    pub async fn restore_from_seed_phrase(
        &self,
        user_id: &str,
        phrase: &str,
        password: &str,
    ) -> Result<PublicKey, KeyError> {
        let phrase = SeedPhrase::parse(phrase)?;
        self.create_key_pair(user_id, password, &phrase).await
    }
}
