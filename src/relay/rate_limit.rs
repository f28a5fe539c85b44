// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-user fixed-window rate limiter.
//!
//! Each user may send `limit` messages per `window`; the window restarts
//! with the first message after it ends. Idle windows are dropped
//! periodically so the map does not grow without bound.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default quota: 10 messages ...
pub const DEFAULT_RATE_LIMIT: u32 = 10;
/// ... per 10 seconds.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(10);

/// Minimum interval between cleanup sweeps.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

struct Window {
    started: Instant,
    count: u32,
}

struct Inner {
    windows: HashMap<String, Window>,
    last_cleanup: Instant,
}

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            inner: Mutex::new(Inner {
                windows: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Count one message for `key`. Returns false once the quota for the
    /// current window is used up.
    pub async fn consume(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        self.maybe_cleanup(&mut inner, now);

        let window = inner
            .windows
            .entry(key.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        true
    }

    /// Number of users with a live window.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.windows.len()
    }

    fn maybe_cleanup(&self, inner: &mut Inner, now: Instant) {
        if now.duration_since(inner.last_cleanup) < CLEANUP_INTERVAL {
            return;
        }
        inner.last_cleanup = now;
        let window = self.window;
        inner
            .windows
            .retain(|_, w| now.duration_since(w.started) < window);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT, DEFAULT_RATE_WINDOW)
    }
}
