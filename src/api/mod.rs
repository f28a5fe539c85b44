// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, Role, TokenPair},
    models::{
        AuthResponse, ChatMessage, ChatResponse, CreateChatRequest, CredentialsRequest,
        MessageResponse, PublicKeyResponse, RefreshRequest, SavePublicKeyRequest,
        SendMessageRequest, SentMessageResponse, SweepResponse,
    },
    relay::socket,
    state::AppState,
};

pub mod auth;
pub mod chats;
pub mod health;
pub mod keys;
pub mod messages;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/keys", post(keys::save_public_key))
        .route(
            "/keys/recipient/{chat_id}",
            get(keys::get_recipient_public_key),
        )
        .route("/chats", post(chats::create_chat))
        .route("/chats/{chat_id}", get(chats::get_chat))
        .route(
            "/chats/{chat_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/admin/tokens/sweep", post(auth::sweep_tokens))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state.clone());

    let socket_routes = Router::new()
        .route("/ws", get(socket::relay_socket))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(socket_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        keys::save_public_key,
        keys::get_recipient_public_key,
        chats::create_chat,
        chats::get_chat,
        messages::list_messages,
        messages::send_message,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::sweep_tokens,
        health::health,
        health::liveness,
        health::readiness,
        socket::relay_socket
    ),
    components(
        schemas(
            SavePublicKeyRequest,
            PublicKeyResponse,
            MessageResponse,
            CreateChatRequest,
            ChatResponse,
            SendMessageRequest,
            ChatMessage,
            SentMessageResponse,
            CredentialsRequest,
            AuthResponse,
            RefreshRequest,
            TokenPair,
            SweepResponse,
            AuthenticatedUser,
            Role
        )
    ),
    tags(
        (name = "Keys", description = "Public key registration and lookup"),
        (name = "Chats", description = "Two-party conversations"),
        (name = "Messages", description = "Encrypted message history and sending"),
        (name = "Auth", description = "Accounts and session tokens"),
        (name = "Relay", description = "Realtime WebSocket relay"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;
