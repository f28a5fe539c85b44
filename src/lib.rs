// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed Chat - End-to-End Encrypted Messaging Core
//!
//! Two participants derive a per-chat session key from their X25519 identity
//! keys and exchange messages the server cannot read. The server adds a
//! second, server-keyed layer when it stores a message and removes it again
//! when history is read back.
//!
//! ## Modules
//!
//! - `crypto` - Key types, seed phrases, sealed key records, key exchange, envelopes
//! - `client` - Client-side key manager with password prompt and inactivity wipe
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens and authorization
//! - `relay` - Realtime WebSocket relay
//! - `storage` - redb-backed chat database

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod relay;
pub mod state;
pub mod storage;
