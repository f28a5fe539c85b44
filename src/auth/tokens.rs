// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Tokens
//!
//! HS256 access and refresh tokens signed with separate secrets.
//!
//! - Access tokens are never stored; a valid signature and an unexpired
//!   `exp` are the whole check.
//! - Refresh tokens are also tracked in the `refresh_tokens` table by
//!   SHA-256 hash. A refresh consumes the record (lookup and revoke in one
//!   write transaction) and issues a fresh pair, so a token can rotate at
//!   most once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::claims::{AuthenticatedUser, TokenClaims, TokenKind};
use super::AuthError;
use crate::storage::{ChatDatabase, ConsumeOutcome, RefreshTokenRecord};

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Secrets and lifetimes for [`TokenService`].
#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issues, verifies, rotates and revokes session tokens.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
    db: Arc<ChatDatabase>,
}

/// Hex SHA-256 of a token, the key of its revocation record.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl TokenService {
    pub fn new(settings: TokenSettings, db: Arc<ChatDatabase>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            access: SigningKeys::new(&settings.access_secret),
            refresh: SigningKeys::new(&settings.refresh_secret),
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            validation,
            db,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue a new pair for `user` and record the refresh token.
    pub fn issue_tokens(&self, user: &AuthenticatedUser) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let (access_token, _) = self.sign(user, TokenKind::Access, now)?;
        let (refresh_token, refresh_exp) = self.sign(user, TokenKind::Refresh, now)?;

        let expires_at = DateTime::<Utc>::from_timestamp(refresh_exp, 0)
            .ok_or_else(|| AuthError::Internal("refresh expiry out of range".into()))?;
        self.db.insert_refresh_token(&RefreshTokenRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user.user_id.clone(),
            token_hash: token_hash(&refresh_token),
            expires_at,
            is_revoked: false,
            created_at: now,
        })?;

        debug!(user_id = %user.user_id, "Issued token pair");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify an access token: signature and expiry only.
    pub fn verify_access(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode(token, TokenKind::Access)?;
        Ok(claims.into())
    }

    /// Verify a refresh token and consume its record.
    ///
    /// Fails closed: a revoked, expired or unrecorded token is an error even
    /// when its signature is valid.
    pub fn verify_and_consume_refresh(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.decode(token, TokenKind::Refresh)?;

        match self.db.consume_refresh_token(&token_hash(token), Utc::now())? {
            ConsumeOutcome::Consumed(record) if record.user_id == claims.sub => Ok(claims.into()),
            ConsumeOutcome::Consumed(_) => {
                warn!(user_id = %claims.sub, "Refresh token record belongs to another user");
                Err(AuthError::UnknownToken)
            }
            ConsumeOutcome::Revoked => {
                warn!(user_id = %claims.sub, "Revoked refresh token presented");
                Err(AuthError::TokenRevoked)
            }
            ConsumeOutcome::Expired => Err(AuthError::TokenExpired),
            ConsumeOutcome::Unknown => Err(AuthError::UnknownToken),
        }
    }

    /// Rotation-on-use: consume `refresh_token` and issue a new pair.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user = self.verify_and_consume_refresh(refresh_token)?;
        let pair = self.issue_tokens(&user)?;
        info!(user_id = %user.user_id, "Rotated refresh token");
        Ok(pair)
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    pub fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self.db.revoke_refresh_token(&token_hash(refresh_token))? {
            info!("Revoked refresh token");
        }
        Ok(())
    }

    /// Delete expired and revoked refresh token records.
    pub fn sweep(&self) -> Result<usize, AuthError> {
        Ok(self.db.sweep_refresh_tokens(Utc::now())?)
    }

    fn sign(
        &self,
        user: &AuthenticatedUser,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<(String, i64), AuthError> {
        let (keys, ttl) = match kind {
            TokenKind::Access => (&self.access, self.access_ttl),
            TokenKind::Refresh => (&self.refresh, self.refresh_ttl),
        };
        let iat = now.timestamp();
        let exp = iat.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
        let claims = TokenClaims {
            sub: user.user_id.clone(),
            role: user.role,
            kind,
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok((token, exp))
    }

    fn decode(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        let keys = match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };
        let data = decode::<TokenClaims>(token, &keys.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;
        if data.claims.kind != kind {
            return Err(AuthError::MalformedToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn test_token_service(db: Arc<ChatDatabase>) -> TokenService {
    TokenService::new(
        TokenSettings {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        },
        db,
    )
}
