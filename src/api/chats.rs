// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Two-party chat creation and lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    auth::RequireUser,
    error::ApiError,
    models::{ChatResponse, CreateChatRequest},
    state::AppState,
    storage::StorageError,
};

/// Start a chat with another user, or return the existing one.
#[utoipa::path(
    post,
    path = "/v1/chats",
    request_body = CreateChatRequest,
    tag = "Chats",
    responses(
        (status = 201, description = "Chat created", body = ChatResponse),
        (status = 200, description = "Chat already existed", body = ChatResponse),
        (status = 400, description = "Invalid participant")
    )
)]
pub async fn create_chat(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let (chat, created) = state
        .db
        .create_chat(&user.user_id, request.participant_id.trim())?;
    if created {
        info!(chat_id = %chat.id, user_id = %user.user_id, "Chat created");
    }
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(chat.into())))
}

#[utoipa::path(
    get,
    path = "/v1/chats/{chat_id}",
    params(
        ("chat_id" = String, Path, description = "Chat identifier")
    ),
    tag = "Chats",
    responses(
        (status = 200, body = ChatResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn get_chat(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ChatResponse>, ApiError> {
    match state.db.chat_for_participant(&chat_id, &user.user_id) {
        Ok(chat) => Ok(Json(chat.into())),
        Err(StorageError::NotFound(_)) => Err(ApiError::not_found("Chat not found")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedUser, Role};
    use crate::state::test_state;

    fn as_user(id: &str) -> RequireUser {
        RequireUser(AuthenticatedUser::new(id, Role::User))
    }

    fn with(participant: &str) -> Json<CreateChatRequest> {
        Json(CreateChatRequest {
            participant_id: participant.into(),
        })
    }

    #[tokio::test]
    async fn create_chat_is_idempotent_per_pair() {
        let (state, _dir) = test_state();
        let (status, Json(first)) = create_chat(State(state.clone()), as_user("alice"), with("bob"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let (status, Json(again)) = create_chat(State(state.clone()), as_user("bob"), with("alice"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn chat_with_self_is_rejected() {
        let (state, _dir) = test_state();
        let err = create_chat(State(state), as_user("alice"), with("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn outsiders_cannot_read_a_chat() {
        let (state, _dir) = test_state();
        let (chat, _) = state.db.create_chat("alice", "bob").unwrap();
        let err = get_chat(Path(chat.id.clone()), State(state.clone()), as_user("eve"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = get_chat(Path("missing".into()), State(state), as_user("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
