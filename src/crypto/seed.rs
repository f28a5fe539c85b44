// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery phrases and deterministic identity derivation.
//!
//! A 24-word BIP39 phrase plus the account password determine the X25519
//! identity pair. The password is the BIP39 passphrase, so the same phrase
//! under a different password yields an unrelated key pair.
//!
//! Derivation:
//!
//! ```text
//! seed    = BIP39-seed(nfkd(phrase), passphrase = nfkd(password))[..32]
//! scalar  = clamp(SHA-512(seed)[..32])
//! keypair = X25519(scalar)
//! ```
//!
//! The middle step is the standard Ed25519-seed to Curve25519 conversion,
//! so the derived identity could double as a signing key later.

use std::fmt;

use bip39::{Language, Mnemonic};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, Zeroizing};

use super::keys::{IdentityKeyPair, PrivateKey};
use super::secret::{SecretKey32, KEY_LEN};
use super::CryptoError;

/// Number of words in a recovery phrase.
pub const SEED_PHRASE_WORDS: usize = 24;

/// Entropy behind a 24-word phrase.
const ENTROPY_LEN: usize = 32;

/// A normalised recovery phrase. Zeroized on drop.
pub struct SeedPhrase(Zeroizing<String>);

impl SeedPhrase {
    /// Generate a fresh phrase from 256 bits of OS entropy.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
        OsRng.fill_bytes(entropy.as_mut());
        let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_ref())
            .map_err(|e| CryptoError::InvalidSeedPhrase(e.to_string()))?;
        Ok(Self(Zeroizing::new(mnemonic.to_string())))
    }

    /// Normalise and validate a user-entered phrase.
    ///
    /// Checks word count, wordlist membership and the BIP39 checksum.
    pub fn parse(input: &str) -> Result<Self, CryptoError> {
        let normalized = normalize_seed_phrase(input);
        let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
        if words != SEED_PHRASE_WORDS {
            return Err(CryptoError::InvalidSeedPhrase(format!(
                "expected {SEED_PHRASE_WORDS} words, got {words}"
            )));
        }
        Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| CryptoError::InvalidSeedPhrase(e.to_string()))?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }

    /// Derive the identity pair bound to this phrase and `password`.
    pub fn derive_key_pair(&self, password: &str) -> Result<IdentityKeyPair, CryptoError> {
        if password.is_empty() {
            return Err(CryptoError::PasswordRequired);
        }
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, self.as_str())
            .map_err(|e| CryptoError::InvalidSeedPhrase(e.to_string()))?;
        let passphrase: Zeroizing<String> = Zeroizing::new(password.nfkd().collect());
        let mut seed = mnemonic.to_seed_normalized(&passphrase);

        let mut digest = Sha512::digest(&seed[..KEY_LEN]);
        seed.zeroize();
        let mut scalar = [0u8; KEY_LEN];
        scalar.copy_from_slice(&digest[..KEY_LEN]);
        digest.as_mut_slice().zeroize();
        clamp(&mut scalar);

        let private = PrivateKey::from_secret(SecretKey32::from_bytes(scalar));
        scalar.zeroize();
        Ok(IdentityKeyPair::from_private(private))
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase(<{} words>)", self.word_count())
    }
}

/// NFKD, lowercase, collapse runs of whitespace to single spaces.
pub fn normalize_seed_phrase(input: &str) -> Zeroizing<String> {
    let decomposed: Zeroizing<String> = Zeroizing::new(input.nfkd().collect());
    let lowered = Zeroizing::new(decomposed.to_lowercase());
    Zeroizing::new(lowered.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// True when `input` is a well-formed 24-word phrase.
pub fn validate_seed_phrase(input: &str) -> bool {
    SeedPhrase::parse(input).is_ok()
}

fn clamp(scalar: &mut [u8; KEY_LEN]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}
