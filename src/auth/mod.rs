// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens for the chat API and the realtime relay.
//!
//! ## Auth Flow
//!
//! 1. `POST /v1/auth/register` or `POST /v1/auth/login` checks the
//!    Argon2id password hash and calls [`TokenService::issue_tokens`].
//! 2. Clients send `Authorization: Bearer <access token>` (or the
//!    `access_token` cookie; the WebSocket handshake also takes `?token=`).
//! 3. The server verifies the HS256 signature and expiry, then extracts:
//!    - `sub` → `user_id`
//!    - `role` → [`Role`]
//! 4. `POST /v1/auth/refresh` rotates the refresh token on every use.
//!
//! ## Security
//!
//! - Access and refresh tokens are signed with different secrets
//! - Only SHA-256 hashes of refresh tokens are stored
//! - No clock skew tolerance

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod sweeper;
pub mod tokens;

pub use claims::{AuthenticatedUser, Principal, TokenClaims, TokenKind};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, CurrentPrincipal, RequireUser};
pub use roles::Role;
pub use sweeper::TokenSweeper;
pub use tokens::{TokenPair, TokenService, TokenSettings};
