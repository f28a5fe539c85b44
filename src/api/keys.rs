// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key directory: register your own key, look up a chat partner's.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::{
    auth::RequireUser,
    crypto::PublicKey,
    error::ApiError,
    models::{MessageResponse, PublicKeyResponse, SavePublicKeyRequest},
    state::AppState,
    storage::StorageError,
};

#[utoipa::path(
    post,
    path = "/v1/keys",
    request_body = SavePublicKeyRequest,
    tag = "Keys",
    responses(
        (status = 200, body = MessageResponse),
        (status = 400, description = "Invalid public key length, or a key is already registered"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn save_public_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<SavePublicKeyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let key = PublicKey::from_base64(request.public_key.trim())
        .map_err(|_| ApiError::bad_request("Invalid public key length"))?;

    match state.db.save_public_key(&user.user_id, &key) {
        Ok(()) => {
            info!(user_id = %user.user_id, "Registered public key");
            Ok(Json(MessageResponse::new("Public key saved successfully")))
        }
        Err(StorageError::AlreadyExists(_)) => Err(ApiError::bad_request("Public key already exists")),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    get,
    path = "/v1/keys/recipient/{chat_id}",
    params(
        ("chat_id" = String, Path, description = "Chat whose other participant's key is wanted")
    ),
    tag = "Keys",
    responses(
        (status = 200, body = PublicKeyResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Chat or recipient key not found")
    )
)]
pub async fn get_recipient_public_key(
    Path(chat_id): Path<String>,
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    match state.db.recipient_public_key(&chat_id, &user.user_id) {
        Ok(Some(key)) => Ok(Json(PublicKeyResponse {
            public_key: key.to_base64(),
        })),
        Ok(None) => Err(ApiError::not_found("Recipient public key not found")),
        Err(StorageError::NotFound(_)) => Err(ApiError::not_found("Chat not found")),
        Err(e) => Err(e.into()),
    }
}
