// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password sealing of the private key for local persistence.
//!
//! ```text
//! wrapping_key = PBKDF2-HMAC-SHA256(password, salt, 100 000 rounds, 32 bytes)
//! data         = XChaCha20-Poly1305(wrapping_key, nonce, private_key)
//! ```
//!
//! The record is persisted as `{"salt": b64, "nonce": b64, "data": b64}`.
//! Neither the wrapping key nor the plaintext key is ever logged or returned.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::PrivateKey;
use super::secret::{SecretKey32, KEY_LEN};
use super::CryptoError;

/// PBKDF2 iteration count. Changing it invalidates every stored record.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 24;

/// A password-wrapped private key, ready for local persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKeyRecord {
    pub salt: String,
    pub nonce: String,
    pub data: String,
}

/// Stretch `password` into a 32-byte wrapping key.
pub fn derive_wrapping_key(password: &str, salt: &[u8]) -> Result<SecretKey32, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::PasswordRequired);
    }
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, PBKDF2_ITERATIONS, out.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(SecretKey32::from_bytes(*out))
}

/// Seal `private_key` under `password` with a fresh salt and nonce.
pub fn wrap_private_key(
    private_key: &PrivateKey,
    password: &str,
) -> Result<SealedKeyRecord, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::PasswordRequired);
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let wrapping_key = derive_wrapping_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(wrapping_key.as_bytes()));
    let data = cipher
        .encrypt(XNonce::from_slice(&nonce), private_key.as_bytes().as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    Ok(SealedKeyRecord {
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce),
        data: STANDARD.encode(data),
    })
}

/// Open a sealed record with `password`.
///
/// Decoding problems surface as [`CryptoError::MalformedRecord`]; a failed
/// tag check (wrong password or tampered data) as
/// [`CryptoError::Authentication`].
pub fn unwrap_private_key(
    record: &SealedKeyRecord,
    password: &str,
) -> Result<PrivateKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::PasswordRequired);
    }

    let salt = decode_field("salt", &record.salt)?;
    let nonce = decode_field("nonce", &record.nonce)?;
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::MalformedRecord(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    let data = decode_field("data", &record.data)?;

    let wrapping_key = derive_wrapping_key(password, &salt)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(wrapping_key.as_bytes()));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(XNonce::from_slice(&nonce), data.as_slice())
            .map_err(|_| CryptoError::Authentication)?,
    );

    PrivateKey::from_slice(&plaintext)
        .map_err(|_| CryptoError::MalformedRecord("sealed key has the wrong length".into()))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    if value.is_empty() {
        return Err(CryptoError::MalformedRecord(format!("{name} is empty")));
    }
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::MalformedRecord(format!("{name}: {e}")))
}
