// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! WebSocket endpoint for the relay.
//!
//! The handshake is authenticated before the upgrade: the access token is
//! taken from `?token=`, the `Authorization` header or the `access_token`
//! cookie, and a missing or invalid token is answered with 401 instead of a
//! socket. There is no anonymous mode.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query, State,
    },
    http::{request::Parts, HeaderMap},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use utoipa::IntoParams;

use super::{ClientEvent, Relay, RelayError};
use crate::auth::extractor::access_token_from_headers;
use crate::auth::{AuthError, AuthenticatedUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SocketParams {
    /// Access token, for clients that cannot set headers on the handshake.
    pub token: Option<String>,
}

/// Access token for the handshake, query parameter first.
pub fn handshake_token(params: &SocketParams, headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(token) = params.token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    access_token_from_headers(headers)?.ok_or(AuthError::MissingToken)
}

/// Handshake authentication. Runs before the upgrade extractor, so a
/// rejected handshake never becomes a socket.
pub struct SocketAuth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for SocketAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let params = Query::<SocketParams>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();
        let token = handshake_token(&params, &parts.headers).inspect_err(|err| {
            warn!(error_code = err.error_code(), "Rejected relay handshake");
        })?;
        let user = state.tokens.verify_access(&token).inspect_err(|err| {
            warn!(error_code = err.error_code(), "Rejected relay handshake");
        })?;
        Ok(SocketAuth(user))
    }
}

#[utoipa::path(
    get,
    path = "/ws",
    params(SocketParams),
    tag = "Relay",
    responses(
        (status = 101, description = "Switching to the relay protocol"),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn relay_socket(
    SocketAuth(user): SocketAuth,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| serve_connection(socket, relay, user))
}

async fn serve_connection(socket: WebSocket, relay: Relay, user: AuthenticatedUser) {
    let (mut sink, mut stream) = socket.split();
    let (mut connection, mut events) = relay.connect(user).await;

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode relay event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => relay.handle_event(&mut connection, event).await,
                Err(e) => connection.notify(RelayError::InvalidEvent(e.to_string()).to_event()),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Relay socket read failed");
                break;
            }
        }
    }

    relay.disconnect(connection).await;
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};

    #[test]
    fn query_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        let params = SocketParams {
            token: Some("from-query".into()),
        };
        assert_eq!(handshake_token(&params, &headers).unwrap(), "from-query");
    }

    #[test]
    fn falls_back_to_header_then_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "access_token=from-cookie".parse().unwrap());
        assert_eq!(
            handshake_token(&SocketParams::default(), &headers).unwrap(),
            "from-cookie"
        );

        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(
            handshake_token(&SocketParams::default(), &headers).unwrap(),
            "from-header"
        );
    }

    #[test]
    fn no_token_is_rejected() {
        assert!(matches!(
            handshake_token(&SocketParams::default(), &HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }
}
