// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message history and sending over REST.
//!
//! Bodies are end-to-end envelopes; the server only adds and strips its
//! storage layer.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::{
    auth::RequireUser,
    crypto::envelope::open_storage,
    error::ApiError,
    models::{ChatMessage, SendMessageRequest, SentMessageResponse},
    state::AppState,
    storage::StorageError,
};

/// Chat history, oldest first, with the storage layer removed.
///
/// A message whose storage layer does not open is left out rather than
/// returned with empty content.
#[utoipa::path(
    get,
    path = "/v1/chats/{chat_id}/messages",
    params(
        ("chat_id" = String, Path, description = "Chat identifier")
    ),
    tag = "Messages",
    responses(
        (status = 200, body = [ChatMessage]),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn list_messages(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    match state.db.chat_for_participant(&chat_id, &user.user_id) {
        Ok(_) => {}
        Err(StorageError::NotFound(_)) => return Err(ApiError::not_found("Chat not found")),
        Err(e) => return Err(e.into()),
    }

    let stored = state.db.list_messages(&chat_id)?;
    let messages = stored
        .into_iter()
        .filter_map(|message| match open_storage(&state.storage_key, &message.content) {
            Ok(content) => Some(ChatMessage {
                id: message.id,
                chat_id: message.chat_id,
                sender_id: message.sender_id,
                content,
                created_at: message.created_at,
            }),
            Err(e) => {
                warn!(
                    chat_id = %chat_id,
                    message_id = %message.id,
                    error = %e,
                    "Skipping undecryptable message"
                );
                None
            }
        })
        .collect();

    Ok(Json(messages))
}

/// Send over REST instead of the socket. Same path as `sendMessage`:
/// rate limit, storage layer, persist, then live delivery.
#[utoipa::path(
    post,
    path = "/v1/chats/{chat_id}/messages",
    params(
        ("chat_id" = String, Path, description = "Chat identifier")
    ),
    request_body = SendMessageRequest,
    tag = "Messages",
    responses(
        (status = 201, body = SentMessageResponse),
        (status = 400, description = "Malformed message envelope"),
        (status = 403, description = "Access denied"),
        (status = 429, description = "Too many messages")
    )
)]
pub async fn send_message(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SentMessageResponse>), ApiError> {
    let sent = state
        .relay
        .send_message(&user.user_id, &chat_id, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(sent.into())))
}
