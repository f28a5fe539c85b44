// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Realtime wire events.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": {...}}`:
//!
//! | Direction | Event | Data |
//! |-----------|-------|------|
//! | client → server | `sendMessage` | `{chatId, content}` (content is the end-to-end envelope) |
//! | client → server | `joinChat` / `leaveChat` | `{chatId}` |
//! | server → client | `receiveMessage` | `{id, chatId, senderId, content, createdAt}` |
//! | server → client | `error` | `{type, message}` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    SendMessage(OutgoingMessage),
    JoinChat(ChatRef),
    LeaveChat(ChatRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRef {
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage(ReceivedMessage),
    Error(ErrorEvent),
}

/// A message as delivered to participants. `content` is the end-to-end
/// envelope exactly as the sender submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ServerEvent {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorEvent {
            kind: kind.into(),
            message: message.into(),
        })
    }
}
