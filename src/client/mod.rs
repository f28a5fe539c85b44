// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Key Lifecycle
//!
//! What runs on the user's device: custody of the unsealed private key,
//! derivation and caching of per-chat session keys, password prompting,
//! and the inactivity wipe.
//!
//! - `keystore` - Local persistence of sealed key records
//! - `directory` - Recipient public key lookup
//! - `prompt` - Password prompt channel
//! - `manager` - The key cache itself
//! - `inactivity` - Idle wipe task

pub mod directory;
pub mod error;
pub mod inactivity;
pub mod keystore;
pub mod manager;
pub mod prompt;

pub use directory::{HttpKeyDirectory, PublicKeyDirectory, StaticKeyDirectory};
pub use error::KeyError;
pub use inactivity::InactivityMonitor;
pub use keystore::{FileKeyStore, KeyStore, MemoryKeyStore};
pub use manager::{KeyManager, KeyManagerConfig};
pub use prompt::{password_channel, PasswordPrompter, PasswordRequest};
