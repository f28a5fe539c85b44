// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Owned secret buffers.
//!
//! Key material lives in [`SecretKey32`], which overwrites its bytes with
//! zeros when dropped. It is deliberately not `Clone` or `Copy`: share it
//! by reference or behind an `Arc`, never by duplicating the bytes.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CryptoError;

/// Length in bytes of every symmetric and X25519 key in this crate.
pub const KEY_LEN: usize = 32;

/// 32 bytes of secret key material, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey32([u8; KEY_LEN]);

impl SecretKey32 {
    /// Take ownership of raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Copy key bytes out of a slice, rejecting any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Fill a new buffer from the OS CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// True when every byte is zero (a wiped or never-initialised key).
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().fold(0u8, |acc, b| acc | b) == 0
    }
}

impl fmt::Debug for SecretKey32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey32(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(matches!(
            SecretKey32::from_slice(&[1u8; 31]),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(SecretKey32::from_slice(&[1u8; 32]).is_ok());
    }

    #[test]
    fn zeroize_clears_bytes() {
        let mut key = SecretKey32::from_bytes([7u8; KEY_LEN]);
        assert!(!key.is_zeroed());
        key.zeroize();
        assert!(key.is_zeroed());
    }

    #[test]
    fn random_keys_differ() {
        let a = SecretKey32::random();
        let b = SecretKey32::random();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = SecretKey32::from_bytes([0xAB; KEY_LEN]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("171"));
        assert!(!rendered.to_lowercase().contains("ab"));
    }
}
