// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive `ToSchema`
//! for the OpenAPI document and use camelCase on the wire.
//!
//! ## Model Categories
//!
//! - **Keys**: public key registration and lookup
//! - **Chats**: two-party conversations
//! - **Messages**: history and REST send; `content` is always the
//!   end-to-end envelope, never plaintext
//! - **Auth**: register, login, refresh and logout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::relay::{Delivery, SentMessage};
use crate::storage::StoredChat;

// =============================================================================
// Keys
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavePublicKeyRequest {
    /// Base64 X25519 public key (32 bytes).
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Chats
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    /// The other participant.
    pub participant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: String,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredChat> for ChatResponse {
    fn from(chat: StoredChat) -> Self {
        Self {
            id: chat.id,
            participants: chat.participants.to_vec(),
            created_at: chat.created_at,
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// End-to-end envelope `base64(nonce):base64(ciphertext)`.
    pub content: String,
}

/// One entry of a chat's history, storage layer removed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    /// End-to-end envelope; only the participants can open it.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentMessageResponse {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub created_at: DateTime<Utc>,
    /// Whether the recipient was online and received it live.
    pub delivered: bool,
}

impl From<SentMessage> for SentMessageResponse {
    fn from(sent: SentMessage) -> Self {
        Self {
            id: sent.message.id,
            chat_id: sent.message.chat_id,
            sender_id: sent.message.sender_id,
            recipient_id: sent.recipient_id,
            created_at: sent.message.created_at,
            delivered: sent.delivery == Delivery::Delivered,
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

/// Body of both `register` and `login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// A fresh session. The same tokens are also set as cookies.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Falls back to the `refresh_token` cookie when absent.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SweepResponse {
    pub removed: usize,
}
