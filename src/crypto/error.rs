// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors raised by the cryptographic primitives.

/// Cryptographic failure.
///
/// Envelope parsing and envelope authentication fail with different
/// variants so callers can tell a truncated or garbled message from one
/// that was tampered with or sealed under another key.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A password was required but empty.
    #[error("password is required")]
    PasswordRequired,

    /// Key bytes have the wrong length or encoding, or are unusable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Recovery phrase failed validation.
    #[error("invalid seed phrase: {0}")]
    InvalidSeedPhrase(String),

    /// Underlying KDF primitive failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AEAD sealing failed.
    #[error("encryption failed")]
    Encryption,

    /// Sealed key record could not be decoded.
    #[error("malformed sealed key record: {0}")]
    MalformedRecord(String),

    /// Sealed key record failed authentication (wrong password or tampered).
    #[error("sealed key authentication failed")]
    Authentication,

    /// Envelope is structurally invalid; no decryption was attempted.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope failed AEAD verification.
    #[error("decryption failed")]
    DecryptionFailed,
}
