// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `chat.redb` | `./data` |
//! | `JWT_SECRET` | HS256 secret for access tokens | Random per process (dev only) |
//! | `JWT_REFRESH_SECRET` | HS256 secret for refresh tokens | Random per process (dev only) |
//! | `ACCESS_TOKEN_EXPIRATION` | Access token lifetime | `15m` |
//! | `REFRESH_TOKEN_EXPIRATION` | Refresh token lifetime | `7d` |
//! | `DB_ENCRYPTION_KEY` | 64 hex chars, storage-layer AES-256 key | Required |
//! | `TOKEN_SWEEP_INTERVAL` | Refresh token sweep period | `24h` |
//! | `MESSAGE_RATE_LIMIT` | Messages per window per user | `10` |
//! | `MESSAGE_RATE_WINDOW` | Rate limit window | `10s` |
//! | `COOKIE_SECURE` | Mark session cookies `Secure` (`false` for plain-HTTP dev) | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Durations take a number with an optional `ms`, `s`, `m`, `h` or `d`
//! suffix; a bare number is milliseconds. Zero is rejected.

use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use crate::auth::sweeper::DEFAULT_SWEEP_INTERVAL;
use crate::auth::tokens::{DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
use crate::auth::TokenSettings;
use crate::crypto::StorageKey;
use crate::relay::RelaySettings;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const ACCESS_TOKEN_EXPIRATION_ENV: &str = "ACCESS_TOKEN_EXPIRATION";
pub const REFRESH_TOKEN_EXPIRATION_ENV: &str = "REFRESH_TOKEN_EXPIRATION";
pub const DB_ENCRYPTION_KEY_ENV: &str = "DB_ENCRYPTION_KEY";
pub const TOKEN_SWEEP_INTERVAL_ENV: &str = "TOKEN_SWEEP_INTERVAL";
pub const MESSAGE_RATE_LIMIT_ENV: &str = "MESSAGE_RATE_LIMIT";
pub const MESSAGE_RATE_WINDOW_ENV: &str = "MESSAGE_RATE_WINDOW";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub tokens: TokenSettings,
    pub storage_key: StorageKey,
    pub sweep_interval: Duration,
    pub relay: RelaySettings,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let storage_key = get(DB_ENCRYPTION_KEY_ENV)
            .ok_or(ConfigError::Missing(DB_ENCRYPTION_KEY_ENV))
            .and_then(|hex| {
                StorageKey::from_hex(hex.trim()).map_err(|e| ConfigError::Invalid {
                    name: DB_ENCRYPTION_KEY_ENV,
                    reason: e.to_string(),
                })
            })?;

        let duration = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match get(name) {
                Some(raw) => parse_duration(&raw).map_err(|reason| ConfigError::Invalid { name, reason }),
                None => Ok(default),
            }
        };

        let rate_limit = match get(MESSAGE_RATE_LIMIT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: MESSAGE_RATE_LIMIT_ENV,
                    reason: "expected a positive integer".into(),
                })?,
            None => crate::relay::DEFAULT_RATE_LIMIT,
        };

        let cookie_secure = match get(COOKIE_SECURE_ENV) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                name: COOKIE_SECURE_ENV,
                reason: format!("expected true or false, got '{}'", raw.trim()),
            })?,
            None => true,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            tokens: TokenSettings {
                access_secret: secret_or_ephemeral(get(JWT_SECRET_ENV), JWT_SECRET_ENV),
                refresh_secret: secret_or_ephemeral(
                    get(JWT_REFRESH_SECRET_ENV),
                    JWT_REFRESH_SECRET_ENV,
                ),
                access_ttl: duration(ACCESS_TOKEN_EXPIRATION_ENV, DEFAULT_ACCESS_TTL)?,
                refresh_ttl: duration(REFRESH_TOKEN_EXPIRATION_ENV, DEFAULT_REFRESH_TTL)?,
            },
            storage_key,
            sweep_interval: duration(TOKEN_SWEEP_INTERVAL_ENV, DEFAULT_SWEEP_INTERVAL)?,
            relay: RelaySettings {
                rate_limit,
                rate_window: duration(MESSAGE_RATE_WINDOW_ENV, crate::relay::DEFAULT_RATE_WINDOW)?,
            },
            cookie_secure,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn secret_or_ephemeral(value: Option<String>, name: &'static str) -> String {
    match value {
        Some(secret) => secret,
        None => {
            warn!(
                variable = name,
                "Signing secret not set; using a random one. Tokens will not survive a restart."
            );
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse `500ms`, `10s`, `15m`, `24h`, `7d` or a bare millisecond count.
/// Zero is an error: every duration here is a period or a lifetime.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("'{raw}' does not start with a number"))?;
    if value == 0 {
        return Err(format!("'{raw}' must be greater than zero"));
    }

    let seconds = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("'{raw}' is too large"))
    };
    match unit.trim() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => seconds(1),
        "m" => seconds(60),
        "h" => seconds(60 * 60),
        "d" => seconds(24 * 60 * 60),
        other => Err(format!("unknown unit '{other}' in '{raw}'")),
    }
}
