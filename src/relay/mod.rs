// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Realtime Relay
//!
//! Routes end-to-end encrypted messages between connected participants.
//!
//! ## Send path
//!
//! 1. Rate-limit the sender (fixed quota per window). Exceeding it sends an
//!    `error` event to the offending connection only.
//! 2. Check the content parses as an end-to-end envelope.
//! 3. Wrap it in the storage layer and persist it. Delivery is attempted
//!    only after the write has committed.
//! 4. Deliver `receiveMessage` to the recipient's live connections (if any)
//!    and echo it to the sender's. An offline recipient reads it later from
//!    message history.
//!
//! The relay never sees plaintext: it holds the storage key but the content
//! it wraps is already end-to-end ciphertext.

pub mod events;
pub mod rate_limit;
pub mod registry;
pub mod socket;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::crypto::envelope::{seal_storage, E2eEnvelope};
use crate::crypto::{CryptoError, StorageKey};
use crate::storage::{ChatDatabase, StorageError};

pub use events::{ClientEvent, ReceivedMessage, ServerEvent};
pub use rate_limit::{RateLimiter, DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW};
pub use registry::{ConnectionRegistry, EventReceiver, EventSender};

/// Message shown to a sender who exceeds the quota.
pub const RATE_LIMIT_MESSAGE: &str = "Too many messages. Please slow down.";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited,

    #[error("Malformed message envelope: {0}")]
    InvalidEnvelope(CryptoError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Failed to encrypt message for storage")]
    Encryption(CryptoError),

    #[error("Failed to store message")]
    Storage(StorageError),

    #[error("Relay task failed: {0}")]
    Task(String),
}

impl RelayError {
    /// `type` field of the error event sent to the client.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::RateLimited => "RateLimit",
            RelayError::InvalidEnvelope(_) => "InvalidMessage",
            RelayError::InvalidEvent(_) => "InvalidEvent",
            RelayError::Forbidden => "Forbidden",
            RelayError::ChatNotFound => "NotFound",
            RelayError::Encryption(_) | RelayError::Storage(_) | RelayError::Task(_) => {
                "ServerError"
            }
        }
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::error(self.kind(), self.to_string())
    }
}

impl From<StorageError> for RelayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => RelayError::ChatNotFound,
            StorageError::NotParticipant { .. } => RelayError::Forbidden,
            other => RelayError::Storage(other),
        }
    }
}

/// Quota settings for [`Relay`].
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: DEFAULT_RATE_WINDOW,
        }
    }
}

/// Whether a sent message reached the recipient live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Recipient offline; the message waits in storage.
    Stored,
}

/// A persisted and routed message.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: ReceivedMessage,
    pub recipient_id: String,
    pub delivery: Delivery,
}

/// One authenticated realtime connection.
pub struct Connection {
    pub id: Uuid,
    pub user: AuthenticatedUser,
    rooms: HashSet<String>,
    events: EventSender,
}

impl Connection {
    /// Queue an event for this connection only.
    pub fn notify(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    pub fn has_joined(&self, chat_id: &str) -> bool {
        self.rooms.contains(chat_id)
    }
}

struct RelayInner {
    db: Arc<ChatDatabase>,
    storage_key: Arc<StorageKey>,
    registry: ConnectionRegistry,
    limiter: RateLimiter,
}

#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    pub fn new(db: Arc<ChatDatabase>, storage_key: Arc<StorageKey>, settings: RelaySettings) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                db,
                storage_key,
                registry: ConnectionRegistry::new(),
                limiter: RateLimiter::new(settings.rate_limit, settings.rate_window),
            }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    /// Register an authenticated connection. Events for it arrive on the
    /// returned receiver.
    pub async fn connect(&self, user: AuthenticatedUser) -> (Connection, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.inner
            .registry
            .register(&user.user_id, id, events.clone())
            .await;
        info!(user_id = %user.user_id, connection_id = %id, "Relay connection registered");
        (
            Connection {
                id,
                user,
                rooms: HashSet::new(),
                events,
            },
            receiver,
        )
    }

    pub async fn disconnect(&self, connection: Connection) {
        self.inner
            .registry
            .unregister(&connection.user.user_id, connection.id)
            .await;
        info!(
            user_id = %connection.user.user_id,
            connection_id = %connection.id,
            rooms = connection.rooms.len(),
            "Relay connection closed"
        );
    }

    /// Dispatch one client event. Failures are reported to this connection
    /// as `error` events; nothing is returned to the socket loop.
    pub async fn handle_event(&self, connection: &mut Connection, event: ClientEvent) {
        let result = match event {
            ClientEvent::SendMessage(msg) => self
                .send_message(&connection.user.user_id, &msg.chat_id, &msg.content)
                .await
                .map(|_| ()),
            ClientEvent::JoinChat(chat) => self.join_chat(connection, chat.chat_id).await,
            ClientEvent::LeaveChat(chat) => {
                connection.rooms.remove(&chat.chat_id);
                debug!(user_id = %connection.user.user_id, chat_id = %chat.chat_id, "Left chat");
                Ok(())
            }
        };
        if let Err(err) = result {
            connection.notify(err.to_event());
        }
    }

    /// Persist a message from `sender_id` and route it.
    pub async fn send_message(
        &self,
        sender_id: &str,
        chat_id: &str,
        content: &str,
    ) -> Result<SentMessage, RelayError> {
        if !self.inner.limiter.consume(sender_id).await {
            warn!(user_id = %sender_id, "Message rate limit exceeded");
            return Err(RelayError::RateLimited);
        }

        E2eEnvelope::parse(content).map_err(RelayError::InvalidEnvelope)?;

        let saved = {
            let inner = Arc::clone(&self.inner);
            let chat_id = chat_id.to_string();
            let sender_id = sender_id.to_string();
            let content = content.to_string();
            tokio::task::spawn_blocking(move || {
                let stored = seal_storage(&inner.storage_key, &content)
                    .map_err(RelayError::Encryption)?
                    .encode();
                Ok::<_, RelayError>(inner.db.save_message(&chat_id, &sender_id, &stored)?)
            })
            .await
            .map_err(|e| RelayError::Task(e.to_string()))??
        };

        let message = ReceivedMessage {
            id: saved.message.id.clone(),
            chat_id: saved.message.chat_id.clone(),
            sender_id: saved.message.sender_id.clone(),
            content: content.to_string(),
            created_at: saved.message.created_at,
        };
        let event = ServerEvent::ReceiveMessage(message.clone());

        let delivered = self
            .inner
            .registry
            .try_send(&saved.recipient_id, &event)
            .await;
        self.inner.registry.try_send(sender_id, &event).await;

        let delivery = if delivered > 0 {
            Delivery::Delivered
        } else {
            Delivery::Stored
        };
        debug!(
            chat_id = %chat_id,
            sender_id = %sender_id,
            message_id = %message.id,
            ?delivery,
            "Message relayed"
        );

        Ok(SentMessage {
            message,
            recipient_id: saved.recipient_id,
            delivery,
        })
    }

    async fn join_chat(&self, connection: &mut Connection, chat_id: String) -> Result<(), RelayError> {
        let db = Arc::clone(&self.inner.db);
        let user_id = connection.user.user_id.clone();
        let lookup_chat = chat_id.clone();
        tokio::task::spawn_blocking(move || db.chat_for_participant(&lookup_chat, &user_id))
            .await
            .map_err(|e| RelayError::Task(e.to_string()))??;

        debug!(user_id = %connection.user.user_id, chat_id = %chat_id, "Joined chat");
        connection.rooms.insert(chat_id);
        Ok(())
    }
}
