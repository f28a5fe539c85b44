// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Two-layer message envelopes.
//!
//! | Layer | Key | Cipher | Wire form |
//! |-------|-----|--------|-----------|
//! | End-to-end | [`SessionKey`] | XChaCha20-Poly1305 | `b64(nonce):b64(ciphertext‖tag)` |
//! | Storage | [`StorageKey`] (server only) | AES-256-GCM | `hex(iv):hex(ciphertext):hex(tag)` |
//!
//! The sending client applies the end-to-end layer. The server wraps the
//! resulting string once more with the storage layer when the message is
//! written, and removes it again when history is read back. Opening either
//! layer parses the wire form first, so a structural problem is reported as
//! [`CryptoError::MalformedEnvelope`] before any tag is checked, and a tag
//! mismatch is always [`CryptoError::DecryptionFailed`].

use std::fmt;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::AeadInPlace;
use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use super::keys::SessionKey;
use super::secret::SecretKey32;
use super::CryptoError;

pub const E2E_NONCE_LEN: usize = 24;
pub const E2E_TAG_LEN: usize = 16;
pub const STORAGE_IV_LEN: usize = 12;
pub const STORAGE_TAG_LEN: usize = 16;

// ── End-to-end layer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E2eEnvelope {
    pub nonce: [u8; E2E_NONCE_LEN],
    /// Ciphertext with the Poly1305 tag appended.
    pub ciphertext: Vec<u8>,
}

impl E2eEnvelope {
    /// Parse `nonce:ciphertext`.
    pub fn parse(wire: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = wire.split(':').collect();
        let [nonce, ciphertext] = parts.as_slice() else {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected 2 components, got {}",
                parts.len()
            )));
        };
        if nonce.is_empty() || ciphertext.is_empty() {
            return Err(CryptoError::MalformedEnvelope("empty component".into()));
        }
        let nonce = STANDARD
            .decode(nonce)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("nonce: {e}")))?;
        let nonce: [u8; E2E_NONCE_LEN] = nonce.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!(
                "nonce must be {E2E_NONCE_LEN} bytes, got {}",
                nonce.len()
            ))
        })?;
        let ciphertext = STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("ciphertext: {e}")))?;
        if ciphertext.len() < E2E_TAG_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "ciphertext shorter than the {E2E_TAG_LEN}-byte tag"
            )));
        }
        Ok(Self { nonce, ciphertext })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}:{}",
            STANDARD.encode(self.nonce),
            STANDARD.encode(&self.ciphertext)
        )
    }
}

/// Encrypt `plaintext` for the other chat participant.
pub fn seal_e2e(key: &SessionKey, plaintext: &[u8]) -> Result<E2eEnvelope, CryptoError> {
    let mut nonce = [0u8; E2E_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;
    Ok(E2eEnvelope { nonce, ciphertext })
}

/// Parse and decrypt an end-to-end envelope.
pub fn open_e2e(key: &SessionKey, wire: &str) -> Result<Vec<u8>, CryptoError> {
    let envelope = E2eEnvelope::parse(wire)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// [`open_e2e`] for UTF-8 text messages.
pub fn open_e2e_text(key: &SessionKey, wire: &str) -> Result<String, CryptoError> {
    let bytes = open_e2e(key, wire)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::MalformedEnvelope("plaintext is not UTF-8".into()))
}

// ── Storage layer ─────────────────────────────────────────────────────────────

/// Server-held AES-256 key for the at-rest layer.
pub struct StorageKey(SecretKey32);

impl StorageKey {
    /// Parse a 64-character hex key.
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = zeroize::Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKey(format!("storage key: {e}")))?,
        );
        Ok(Self(SecretKey32::from_slice(&bytes)?))
    }

    pub fn random() -> Self {
        Self(SecretKey32::random())
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(GenericArray::from_slice(self.0.as_bytes()))
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StorageKey(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEnvelope {
    pub iv: [u8; STORAGE_IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; STORAGE_TAG_LEN],
}

impl StorageEnvelope {
    /// Parse `iv:ciphertext:tag`.
    pub fn parse(wire: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = wire.split(':').collect();
        let [iv, ciphertext, tag] = parts.as_slice() else {
            return Err(CryptoError::MalformedEnvelope(format!(
                "expected 3 components, got {}",
                parts.len()
            )));
        };
        if iv.is_empty() || ciphertext.is_empty() || tag.is_empty() {
            return Err(CryptoError::MalformedEnvelope("empty component".into()));
        }
        Ok(Self {
            iv: decode_fixed("iv", iv)?,
            ciphertext: hex::decode(ciphertext)
                .map_err(|e| CryptoError::MalformedEnvelope(format!("ciphertext: {e}")))?,
            tag: decode_fixed("tag", tag)?,
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}",
            hex::encode(self.iv),
            hex::encode(&self.ciphertext),
            hex::encode(self.tag)
        )
    }
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(value)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("{name}: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::MalformedEnvelope(format!("{name} must be {N} bytes, got {}", bytes.len()))
    })
}

/// Wrap an (already end-to-end encrypted) message for storage.
pub fn seal_storage(key: &StorageKey, content: &str) -> Result<StorageEnvelope, CryptoError> {
    let mut iv = [0u8; STORAGE_IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let mut buffer = content.as_bytes().to_vec();
    let tag = key
        .cipher()
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;
    let mut tag_bytes = [0u8; STORAGE_TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());
    Ok(StorageEnvelope {
        iv,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Parse and remove the storage layer, returning the end-to-end wire string.
pub fn open_storage(key: &StorageKey, wire: &str) -> Result<String, CryptoError> {
    let envelope = StorageEnvelope::parse(wire)?;
    let mut buffer = envelope.ciphertext;
    key.cipher()
        .decrypt_in_place_detached(
            GenericArray::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(&envelope.tag),
        )
        .map_err(|_| CryptoError::DecryptionFailed)?;
    String::from_utf8(buffer)
        .map_err(|_| CryptoError::MalformedEnvelope("stored content is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::secret::SecretKey32;

    fn session_key() -> SessionKey {
        SessionKey::from_secret(SecretKey32::random())
    }

    #[test]
    fn e2e_round_trip() {
        let key = session_key();
        for plaintext in ["", "hi", "héllo wörld 👋", &"x".repeat(10_000)] {
            let wire = seal_e2e(&key, plaintext.as_bytes()).unwrap().encode();
            assert_eq!(open_e2e_text(&key, &wire).unwrap(), plaintext);
        }
    }

    #[test]
    fn both_layers_round_trip() {
        let session = session_key();
        let storage = StorageKey::random();
        let e2e = seal_e2e(&session, b"meet at noon").unwrap().encode();
        let stored = seal_storage(&storage, &e2e).unwrap().encode();
        assert_ne!(stored, e2e);
        let unwrapped = open_storage(&storage, &stored).unwrap();
        assert_eq!(unwrapped, e2e);
        assert_eq!(open_e2e_text(&session, &unwrapped).unwrap(), "meet at noon");
    }

    #[test]
    fn e2e_tag_tamper_is_detected() {
        let key = session_key();
        let mut envelope = seal_e2e(&key, b"secret").unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0x80;
        assert!(matches!(
            open_e2e(&key, &envelope.encode()),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn storage_tag_tamper_is_detected() {
        let key = StorageKey::random();
        let mut envelope = seal_storage(&key, "payload").unwrap();
        envelope.tag[0] ^= 0x01;
        assert!(matches!(
            open_storage(&key, &envelope.encode()),
            Err(CryptoError::DecryptionFailed)
        ));

        let mut envelope = seal_storage(&key, "payload").unwrap();
        envelope.ciphertext[0] ^= 0x01;
        assert!(matches!(
            open_storage(&key, &envelope.encode()),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let wire = seal_e2e(&session_key(), b"hi").unwrap().encode();
        assert!(matches!(
            open_e2e(&session_key(), &wire),
            Err(CryptoError::DecryptionFailed)
        ));

        let stored = seal_storage(&StorageKey::random(), "hi").unwrap().encode();
        assert!(matches!(
            open_storage(&StorageKey::random(), &stored),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn malformed_envelopes_fail_before_decryption() {
        let key = session_key();
        for wire in ["", "onlyone", "a:b:c", ":abc", "AAAA:AAAA"] {
            assert!(
                matches!(open_e2e(&key, wire), Err(CryptoError::MalformedEnvelope(_))),
                "{wire:?}"
            );
        }
        let storage = StorageKey::random();
        for wire in ["", "aa:bb", "aa:bb:cc:dd", "zz:00:00", "00:00:00"] {
            assert!(
                matches!(
                    open_storage(&storage, wire),
                    Err(CryptoError::MalformedEnvelope(_))
                ),
                "{wire:?}"
            );
        }
    }

    #[test]
    fn e2e_ciphertext_must_hold_a_tag() {
        let nonce = STANDARD.encode([0u8; E2E_NONCE_LEN]);
        let short = format!("{nonce}:{}", STANDARD.encode([0u8; E2E_TAG_LEN - 1]));
        assert!(matches!(
            E2eEnvelope::parse(&short),
            Err(CryptoError::MalformedEnvelope(_))
        ));

        // A bare tag is well-formed; it only fails authentication.
        let tag_only = format!("{nonce}:{}", STANDARD.encode([0u8; E2E_TAG_LEN]));
        assert!(E2eEnvelope::parse(&tag_only).is_ok());
    }

    #[test]
    fn nonces_are_fresh_per_message() {
        let key = session_key();
        let a = seal_e2e(&key, b"same").unwrap();
        let b = seal_e2e(&key, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn storage_key_from_hex() {
        assert!(StorageKey::from_hex(&"ab".repeat(32)).is_ok());
        assert!(StorageKey::from_hex("abcd").is_err());
        assert!(StorageKey::from_hex(&"zz".repeat(32)).is_err());
    }
}
