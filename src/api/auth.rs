// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account and session endpoints: register, login, refresh and logout.
//!
//! Every endpoint that opens a session returns the token pair in the body
//! and also sets it as `access_token` / `refresh_token` cookies.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{
        extractor::{cookie_value, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        AdminOnly, AuthError, AuthenticatedUser, Role, TokenPair,
    },
    error::ApiError,
    models::{AuthResponse, CredentialsRequest, RefreshRequest, SweepResponse},
    state::AppState,
    storage::{StorageError, StoredUser},
};

const USERNAME_MAX_LEN: usize = 32;
const USERNAME_MIN_LEN: usize = 3;

fn session_cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let secure = if secure { " Secure;" } else { "" };
    format!(
        "{name}={value}; Path=/; HttpOnly;{secure} SameSite=Strict; Max-Age={}",
        max_age.as_secs()
    )
}

fn session_cookies(
    state: &AppState,
    pair: &TokenPair,
) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_TOKEN_COOKIE,
                &pair.access_token,
                state.tokens.access_ttl(),
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_TOKEN_COOKIE,
                &pair.refresh_token,
                state.tokens.refresh_ttl(),
                state.secure_cookies,
            ),
        ),
    ])
}

fn validate_credentials(request: &CredentialsRequest) -> Result<(), ApiError> {
    let username = request.username.trim();
    let valid_username = (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_username {
        return Err(ApiError::bad_request(format!(
            "Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} letters, digits, '_' or '-'"
        )));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn auth_response(user: &StoredUser, pair: TokenPair) -> AuthResponse {
    AuthResponse {
        user_id: user.id.clone(),
        username: user.username.clone(),
        role: user.role,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }
}

/// Create an account and open a session for it.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = CredentialsRequest,
    tag = "Auth",
    responses(
        (status = 201, body = AuthResponse),
        (status = 400, description = "Invalid username or password format"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&request)?;

    let db = std::sync::Arc::clone(&state.db);
    let tokens = std::sync::Arc::clone(&state.tokens);
    let (user, pair) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let user = StoredUser {
            id: Uuid::new_v4().to_string(),
            username: request.username.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            role: Role::User,
            created_at: Utc::now(),
        };
        match db.create_user(&user) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                return Err(ApiError::conflict("Username already taken"))
            }
            Err(e) => return Err(e.into()),
        }
        let pair = tokens.issue_tokens(&AuthenticatedUser::new(user.id.clone(), user.role))?;
        Ok((user, pair))
    })
    .await
    .map_err(ApiError::internal)??;

    tracing::info!(user_id = %user.id, username = %user.username, "Account registered");
    let cookies = session_cookies(&state, &pair);
    Ok((StatusCode::CREATED, cookies, Json(auth_response(&user, pair))))
}

/// Check a username and password and open a session.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = CredentialsRequest,
    tag = "Auth",
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = std::sync::Arc::clone(&state.db);
    let tokens = std::sync::Arc::clone(&state.tokens);
    let (user, pair) = tokio::task::spawn_blocking(move || -> Result<_, AuthError> {
        let user = db
            .get_user_by_username(&request.username)?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&request.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        let pair = tokens.issue_tokens(&AuthenticatedUser::new(user.id.clone(), user.role))?;
        Ok((user, pair))
    })
    .await
    .map_err(ApiError::internal)?
    .inspect_err(|e| tracing::warn!(error_code = e.error_code(), "Login rejected"))?;

    tracing::info!(user_id = %user.id, "Logged in");
    let cookies = session_cookies(&state, &pair);
    Ok((cookies, Json(auth_response(&user, pair))))
}

/// Refresh token from the JSON body, else the `refresh_token` cookie.
fn presented_refresh_token(headers: &HeaderMap, body: &Bytes) -> Result<Option<String>, AuthError> {
    if !body.is_empty() {
        let request: RefreshRequest =
            serde_json::from_slice(body).map_err(|_| AuthError::MalformedToken)?;
        if let Some(token) = request.refresh_token.filter(|t| !t.is_empty()) {
            return Ok(Some(token));
        }
    }
    Ok(cookie_value(headers, REFRESH_TOKEN_COOKIE))
}

/// Rotate the refresh token and issue a new pair.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body(content = RefreshRequest, description = "Optional when the refresh_token cookie is set"),
    tag = "Auth",
    responses(
        (status = 200, body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid, expired or already used")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AuthError> {
    let token = presented_refresh_token(&headers, &body)?.ok_or(AuthError::MissingToken)?;
    let tokens = std::sync::Arc::clone(&state.tokens);
    let pair = tokio::task::spawn_blocking(move || tokens.refresh(&token))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))??;

    let cookies = session_cookies(&state, &pair);
    Ok((cookies, Json(pair)))
}

/// Revoke the presented refresh token, if any, and clear the cookies.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body(content = RefreshRequest, description = "Optional when the refresh_token cookie is set"),
    tag = "Auth",
    responses((status = 204))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // An unreadable body is treated as "no token"; logout always succeeds.
    if let Some(token) = presented_refresh_token(&headers, &body).unwrap_or(None) {
        if let Err(e) = state.tokens.revoke(&token) {
            tracing::warn!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    let cookies = AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(ACCESS_TOKEN_COOKIE, "", Duration::ZERO, state.secure_cookies),
        ),
        (
            SET_COOKIE,
            session_cookie(REFRESH_TOKEN_COOKIE, "", Duration::ZERO, state.secure_cookies),
        ),
    ]);
    (StatusCode::NO_CONTENT, cookies)
}

/// Run the refresh token sweep now instead of waiting for the timer.
#[utoipa::path(
    post,
    path = "/v1/admin/tokens/sweep",
    tag = "Auth",
    responses(
        (status = 200, body = SweepResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn sweep_tokens(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
) -> Result<Json<SweepResponse>, AuthError> {
    let removed = state.tokens.sweep()?;
    tracing::info!(user_id = %admin.user_id, removed, "Manual refresh token sweep");
    Ok(Json(SweepResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::http::header::COOKIE;

    fn json_body(token: &str) -> Bytes {
        Bytes::from(format!(r#"{{"refreshToken":"{token}"}}"#))
    }

    fn credentials(username: &str, password: &str) -> Json<CredentialsRequest> {
        Json(CredentialsRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn register_then_login_issues_working_tokens() {
        let (state, _dir) = test_state();

        let response = register(State(state.clone()), credentials("alice", "correct horse"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);

        let response = login(State(state.clone()), credentials("ALICE", "correct horse"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let session: AuthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, Role::User);

        let user = state.tokens.verify_access(&session.access_token).unwrap();
        assert_eq!(user.user_id, session.user_id);
        assert!(state.tokens.refresh(&session.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn duplicate_username_is_409() {
        let (state, _dir) = test_state();
        register(State(state.clone()), credentials("alice", "correct horse"))
            .await
            .unwrap();

        let err = register(State(state), credentials("Alice", "another secret"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_validates_credentials() {
        let (state, _dir) = test_state();
        for (username, password) in [
            ("al", "correct horse"),
            ("alice smith", "correct horse"),
            ("alice", "short"),
        ] {
            let err = register(State(state.clone()), credentials(username, password))
                .await
                .err()
                .unwrap();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "{username}/{password}");
        }
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (state, _dir) = test_state();
        register(State(state.clone()), credentials("alice", "correct horse"))
            .await
            .unwrap();

        let wrong_password = login(State(state.clone()), credentials("alice", "wrong horse"))
            .await
            .err()
            .unwrap();
        let unknown_user = login(State(state), credentials("mallory", "correct horse"))
            .await
            .err()
            .unwrap();
        assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.status, unknown_user.status);
        assert_eq!(wrong_password.message, unknown_user.message);
    }

    #[test]
    fn secure_flag_follows_state() {
        let cookie = session_cookie(ACCESS_TOKEN_COOKIE, "abc", Duration::from_secs(60), true);
        assert!(cookie.contains("; Secure;"));

        let cookie = session_cookie(ACCESS_TOKEN_COOKIE, "abc", Duration::from_secs(60), false);
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("Max-Age=60"));
    }

    #[tokio::test]
    async fn insecure_state_drops_the_secure_attribute() {
        let (state, _dir) = test_state();
        let state = state.with_secure_cookies(false);
        let response = register(State(state), credentials("alice", "correct horse"))
            .await
            .unwrap()
            .into_response();
        for cookie in response.headers().get_all(SET_COOKIE) {
            assert!(!cookie.to_str().unwrap().contains("Secure"));
        }
    }

    #[tokio::test]
    async fn refresh_rotates_and_sets_cookies() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("alice", Role::User))
            .unwrap();

        let response = refresh(State(state.clone()), HeaderMap::new(), json_body(&pair.refresh_token))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);

        let again = refresh(State(state), HeaderMap::new(), json_body(&pair.refresh_token)).await;
        assert!(matches!(again, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn refresh_reads_the_cookie() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("alice", Role::User))
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("refresh_token={}", pair.refresh_token).parse().unwrap(),
        );

        assert!(refresh(State(state), headers, Bytes::new()).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_without_token_is_401() {
        let (state, _dir) = test_state();
        let result = refresh(State(state), HeaderMap::new(), Bytes::new()).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn logout_revokes_and_always_succeeds() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("alice", Role::User))
            .unwrap();

        let response = logout(State(state.clone()), HeaderMap::new(), json_body(&pair.refresh_token))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(matches!(
            state.tokens.refresh(&pair.refresh_token),
            Err(AuthError::TokenRevoked)
        ));

        let response = logout(State(state), HeaderMap::new(), Bytes::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn admin_sweep_reports_removed_rows() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("alice", Role::User))
            .unwrap();
        state.tokens.revoke(&pair.refresh_token).unwrap();

        let Json(body) = sweep_tokens(
            State(state),
            AdminOnly(AuthenticatedUser::new("root", Role::Admin)),
        )
        .await
        .unwrap();
        assert_eq!(body.removed, 1);
    }
}
