//! Fixed-window per-client rate limiter.
//!
//! Windows are per-client and reset lazily on the next observed request,
//! not on a timer: a client idle past its window gets a fresh full quota
//! on its next request regardless of how many windows elapsed. That is
//! the intended policy, not an oversight. Records are never evicted, so
//! the map grows with the number of distinct clients seen over the
//! process lifetime.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Default window length: 15 minutes.
pub const DEFAULT_WINDOW_MS: i64 = 900_000;
/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allowed,
    /// The client is over quota for the current window.
    Rejected {
        /// Seconds until the client's window resets, rounded up.
        retry_after_secs: u64,
    },
}

impl Decision {
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Per-client request counter for the current window.
#[derive(Debug, Clone)]
struct ClientRateRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Process-local rate limiter state. Each `admit` call is one critical
/// section over the client map, so the read-check-write sequence cannot
/// interleave across concurrent requests.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, ClientRateRecord>>,
}

impl RateLimiter {
    pub fn new(window_ms: i64, max_requests: u32) -> Self {
        Self {
            window: Duration::milliseconds(window_ms),
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a request from `client_id` may proceed right now.
    pub async fn admit(&self, client_id: &str) -> Decision {
        self.admit_at(client_id, Utc::now()).await
    }

    /// Admission check against an explicit clock, for tests.
    async fn admit_at(&self, client_id: &str, now: DateTime<Utc>) -> Decision {
        let mut clients = self.clients.lock().await;

        let Some(record) = clients.get_mut(client_id) else {
            clients.insert(
                client_id.to_string(),
                ClientRateRecord {
                    count: 1,
                    reset_at: now + self.window,
                },
            );
            return Decision::Allowed;
        };

        // Lazy window reset: anything past reset_at starts a fresh window.
        if now > record.reset_at {
            record.count = 1;
            record.reset_at = now + self.window;
            return Decision::Allowed;
        }

        if record.count >= self.max_requests {
            let remaining_ms = (record.reset_at - now).num_milliseconds().max(0);
            let retry_after_secs = remaining_ms.unsigned_abs().div_ceil(1000);
            return Decision::Rejected { retry_after_secs };
        }

        record.count += 1;
        Decision::Allowed
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_REQUESTS)
    }
}
