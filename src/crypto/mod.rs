// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptographic Primitives
//!
//! Everything the messaging core needs to keep message content private
//! between the two participants of a chat.
//!
//! ## Modules
//!
//! - `secret` - Zeroize-on-drop key buffers
//! - `keys` - X25519 identity keys and per-chat session keys
//! - `seed` - 24-word recovery phrases and deterministic key derivation
//! - `sealed` - Password sealing of the private key for local persistence
//! - `exchange` - Static ECDH + HKDF session key agreement
//! - `envelope` - End-to-end and storage-layer message envelopes
//!
//! ## Algorithms
//!
//! | Purpose | Primitive |
//! |---------|-----------|
//! | Identity / key agreement | X25519 |
//! | Private key sealing | PBKDF2-HMAC-SHA256 (100 000 rounds) + XChaCha20-Poly1305 |
//! | Session key derivation | HKDF-SHA256, salted with SHA-256(chat id) |
//! | End-to-end layer | XChaCha20-Poly1305, 24-byte random nonce |
//! | Storage layer | AES-256-GCM, 12-byte random IV |

pub mod envelope;
pub mod error;
pub mod exchange;
pub mod keys;
pub mod sealed;
pub mod secret;
pub mod seed;

pub use envelope::{E2eEnvelope, StorageEnvelope, StorageKey};
pub use error::CryptoError;
pub use exchange::derive_session_key;
pub use keys::{IdentityKeyPair, PrivateKey, PublicKey, SessionKey};
pub use sealed::SealedKeyRecord;
pub use secret::SecretKey32;
pub use seed::SeedPhrase;
