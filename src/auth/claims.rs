// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims and the authenticated principal.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AuthError, Role};

/// Which secret signed a token and what it may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    /// Unique per token, so two pairs issued in the same second differ.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated user information extracted from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Check if the user has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<TokenClaims> for AuthenticatedUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
        }
    }
}

/// Whoever is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Guest,
    Authenticated(AuthenticatedUser),
}

impl Principal {
    /// Role gate: pass only an authenticated user holding `required`.
    pub fn require(&self, required: Role) -> Result<&AuthenticatedUser, AuthError> {
        match self {
            Principal::Authenticated(user) if user.has_role(required) => Ok(user),
            _ => Err(AuthError::InsufficientPermissions),
        }
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Principal::Authenticated(user) => Some(user),
            Principal::Guest => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> TokenClaims {
        TokenClaims {
            sub: "user_123".to_string(),
            role,
            kind: TokenKind::Access,
            jti: "j1".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        }
    }

    #[test]
    fn from_claims_extracts_user_and_role() {
        let user = AuthenticatedUser::from(claims(Role::Admin));
        assert_eq!(user.user_id, "user_123");
        assert!(user.is_admin());
        assert!(user.has_role(Role::User));
    }

    #[test]
    fn guest_fails_every_gate() {
        assert!(matches!(
            Principal::Guest.require(Role::User),
            Err(AuthError::InsufficientPermissions)
        ));
        assert!(Principal::Guest.user().is_none());
    }

    #[test]
    fn user_passes_user_gate_but_not_admin_gate() {
        let principal = Principal::Authenticated(AuthenticatedUser::from(claims(Role::User)));
        assert_eq!(principal.require(Role::User).unwrap().user_id, "user_123");
        assert!(principal.require(Role::Admin).is_err());
    }

    #[test]
    fn token_kind_is_lowercase_on_the_wire() {
        let json = serde_json::to_value(claims(Role::User)).unwrap();
        assert_eq!(json["kind"], "access");
        assert_eq!(json["role"], "user");
    }
}
