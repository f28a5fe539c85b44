// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! The access token is read from `Authorization: Bearer <token>` or, failing
//! that, from the `access_token` cookie.
//!
//! ```rust,ignore
//! async fn my_handler(RequireUser(user): RequireUser) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};

use super::{AuthError, AuthenticatedUser, Principal, Role};
use crate::state::AppState;

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Value of cookie `name`, searching every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Access token from the Authorization header, else the access cookie.
///
/// A present but malformed Authorization header is an error rather than a
/// fall-through to the cookie.
pub fn access_token_from_headers(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(header) = headers.get(AUTHORIZATION) {
        let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;
        return Ok(Some(token.to_string()));
    }
    Ok(cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

/// Extractor for authenticated users. Rejects with 401 when no valid access
/// token is present.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token_from_headers(&parts.headers)?.ok_or(AuthError::MissingToken)?;
        let user = state.tokens.verify_access(&token)?;
        Ok(Auth(user))
    }
}

/// The request principal. No token at all is a [`Principal::Guest`]; a
/// token that fails verification is still a 401.
pub struct CurrentPrincipal(pub Principal);

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match access_token_from_headers(&parts.headers)? {
            None => Ok(CurrentPrincipal(Principal::Guest)),
            Some(token) => {
                let user = state.tokens.verify_access(&token)?;
                Ok(CurrentPrincipal(Principal::Authenticated(user)))
            }
        }
    }
}

/// Role gate for chat routes: guests get 403 `Access denied`.
pub struct RequireUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(parts, state).await?;
        let user = principal.require(Role::User)?.clone();
        Ok(RequireUser(user))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::http::Request;

    fn parts_with(header: Option<(&str, String)>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_a_token() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_bearer_header() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("user_123", Role::User))
            .unwrap();
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {}", pair.access_token))));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
    }

    #[tokio::test]
    async fn auth_extractor_accepts_cookie() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("user_123", Role::User))
            .unwrap();
        let mut parts = parts_with(Some((
            "Cookie",
            format!("theme=dark; access_token={}", pair.access_token),
        )));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");
    }

    #[tokio::test]
    async fn non_bearer_header_is_rejected() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some(("Authorization", "Basic abc".to_string())));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn guest_is_denied_by_require_user() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);
        let result = RequireUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn invalid_token_is_401_not_guest() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some(("Authorization", "Bearer garbage".to_string())));
        let result = CurrentPrincipal::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn admin_only_rejects_users() {
        let (state, _dir) = test_state();
        let pair = state
            .tokens
            .issue_tokens(&AuthenticatedUser::new("user_123", Role::User))
            .unwrap();
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {}", pair.access_token))));
        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[test]
    fn cookie_value_ignores_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "a=1; refresh_token=r; b=2".parse().unwrap());
        assert_eq!(cookie_value(&headers, REFRESH_TOKEN_COOKIE).as_deref(), Some("r"));
        assert_eq!(cookie_value(&headers, ACCESS_TOKEN_COOKIE), None);
    }
}
