// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key lifecycle errors.

use crate::crypto::CryptoError;

/// Failure of a key manager operation.
///
/// None of these are retried automatically; the caller decides whether to
/// prompt again, generate a key, or close the chat view.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The user dismissed the password prompt.
    #[error("action canceled by user")]
    ActionCanceled,

    /// No password was given and no prompt is wired up.
    #[error("password is required")]
    PasswordRequired,

    /// No sealed key is stored for this user; a key pair must be created.
    #[error("no encrypted private key found")]
    NoEncryptedKey,

    /// The sealed key could not be opened with the given password.
    #[error("incorrect password")]
    IncorrectPassword,

    /// ECDH, HKDF or seed derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// The chat partner never registered a public key.
    #[error("recipient public key not found")]
    RecipientPublicKeyNotFound,

    #[error("invalid seed phrase")]
    InvalidSeedPhrase,

    /// Public key lookup failed in transport.
    #[error("key directory error: {0}")]
    Directory(String),

    /// Local key store failed.
    #[error("key store error: {0}")]
    Store(String),

    /// A stored sealed key record exists but cannot be parsed.
    #[error("sealed key record is corrupt: {0}")]
    CorruptRecord(String),
}

impl From<CryptoError> for KeyError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::PasswordRequired => KeyError::PasswordRequired,
            CryptoError::InvalidSeedPhrase(_) => KeyError::InvalidSeedPhrase,
            CryptoError::Authentication | CryptoError::MalformedRecord(_) => {
                KeyError::IncorrectPassword
            }
            other => KeyError::KeyDerivationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_failures_collapse_to_incorrect_password() {
        assert!(matches!(
            KeyError::from(CryptoError::Authentication),
            KeyError::IncorrectPassword
        ));
        assert!(matches!(
            KeyError::from(CryptoError::MalformedRecord("nonce".into())),
            KeyError::IncorrectPassword
        ));
    }

    #[test]
    fn primitive_failures_are_derivation_errors() {
        let err = KeyError::from(CryptoError::KeyDerivation("low order".into()));
        assert!(matches!(err, KeyError::KeyDerivationFailed(_)));
        assert!(err.to_string().contains("low order"));
    }
}
