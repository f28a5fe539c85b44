// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity and session keys.
//!
//! Every user owns one X25519 identity key pair. The public half is
//! registered with the server and is discoverable by chat partners; the
//! private half only ever leaves the client sealed under the account
//! password (see [`super::sealed`]).

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use x25519_dalek::StaticSecret;

use super::secret::{SecretKey32, KEY_LEN};
use super::CryptoError;

// ── Public key ────────────────────────────────────────────────────────────────

/// 32-byte X25519 public key, standard base64 on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode a base64 public key.
    ///
    /// Standard, URL-safe and unpadded URL-safe alphabets are all accepted;
    /// the decoded value must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let trimmed = encoded.trim();
        let bytes = STANDARD
            .decode(trimmed)
            .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
            .or_else(|_| URL_SAFE.decode(trimmed))
            .map_err(|_| CryptoError::InvalidKey("public key is not valid base64".into()))?;
        let arr: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "public key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

// ── Private key ───────────────────────────────────────────────────────────────

/// X25519 private scalar. Zeroized on drop.
#[derive(Debug)]
pub struct PrivateKey(SecretKey32);

impl PrivateKey {
    pub fn from_secret(secret: SecretKey32) -> Self {
        Self(secret)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(SecretKey32::from_slice(bytes)?))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub(crate) fn to_static_secret(&self) -> StaticSecret {
        StaticSecret::from(*self.0.as_bytes())
    }

    /// Compute the matching public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = self.to_static_secret();
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }
}

// ── Identity key pair ─────────────────────────────────────────────────────────

/// A user's long-term key agreement pair.
#[derive(Debug)]
pub struct IdentityKeyPair {
    pub public: PublicKey,
    private: PrivateKey,
}

impl IdentityKeyPair {
    /// Generate a fresh pair from OS randomness.
    pub fn generate() -> Self {
        Self::from_private(PrivateKey(SecretKey32::random()))
    }

    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    pub fn into_private_key(self) -> PrivateKey {
        self.private
    }
}

// ── Session key ───────────────────────────────────────────────────────────────

/// Symmetric key shared by the two participants of one chat.
///
/// Derived, never persisted. Zeroized on drop.
#[derive(Debug)]
pub struct SessionKey(SecretKey32);

impl SessionKey {
    pub fn from_secret(secret: SecretKey32) -> Self {
        Self(secret)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.is_zeroed()
    }
}
