//! Stackable pre-handler checks applied to every route except `/health`
//! (spec §4.2): API key auth, body size, and the sliding-window rate
//! limiter. Each service wires these into its own axum middleware stack
//! since the concrete `AppState` type differs per binary; this module
//! holds the reusable logic.

use axum::http::HeaderMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Constant-time string comparison (accumulate-xor over bytes, padded to
/// the longer length) so a mismatching `X-API-Key` cannot be distinguished
/// by timing from a matching one.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let len = a.len().max(b.len());
    let mut diff: u8 = (a.len() != b.len()) as u8;
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}

/// Read `X-API-Key` and compare it in constant time to `expected`.
pub fn check_api_key(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided.is_empty() || !constant_time_eq(provided, expected) {
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }
    Ok(())
}

/// `Content-Length` cap. `None` header is allowed through (axum's body
/// limit layer enforces the real ceiling as bytes are read); this check
/// only short-circuits requests that declare an oversized length upfront.
pub fn check_content_length(headers: &HeaderMap, max_bytes: usize) -> Result<(), AppError> {
    if let Some(len) = headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if len > max_bytes {
            return Err(AppError::PayloadTooLarge);
        }
    }
    Ok(())
}

/// Single-bucket sliding-window rate limiter (spec §4.2). The ring holds
/// admitted timestamps newer than `now - window`; admission compares the
/// ring length to `limit`. Structured around an explicit key so it
/// generalizes to per-API-key limiting without a redesign, even though
/// every service today calls it with the same constant key.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    ring: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            ring: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Attempt to admit a request at `now`. On success, `now` is recorded.
    /// On rejection, returns the number of whole seconds until the oldest
    /// timestamp in the window ages out.
    pub fn admit(&self, now: Instant) -> Result<(), AppError> {
        let mut ring = self.ring.lock().unwrap();
        while let Some(&front) = ring.front() {
            if now.duration_since(front) >= self.window {
                ring.pop_front();
            } else {
                break;
            }
        }
        if ring.len() < self.limit {
            ring.push_back(now);
            Ok(())
        } else {
            let oldest = *ring.front().expect("limit > 0 implies non-empty ring");
            let age = now.duration_since(oldest);
            let remaining = self.window.saturating_sub(age);
            let retry_after = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            Err(AppError::RateLimited { retry_after })
        }
    }
}
