//! Fixed-window request rate limiting.
//!
//! Counts requests per identifier (for example `auth:203.0.113.9`) in
//! discrete windows. Entries whose window has ended are recreated on next
//! access and removed by a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

/// Counter state for one identifier.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// End of the current window.
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Whole seconds until the window ends, rounded up.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let left = self.reset_at.saturating_duration_since(now);
        let secs = left.as_secs();
        if left.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// In-process fixed-window rate limiter.
///
/// Shared across request tasks behind an `Arc`; the map is guarded by a
/// mutex so concurrent increments are never lost.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    /// Create an empty rate limiter.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a request for `identifier` and decide whether it is allowed.
    pub fn check(&self, identifier: &str, window: Duration, max_requests: u32) -> RateLimitDecision {
        self.check_at(identifier, window, max_requests, Instant::now())
    }

    /// Same as [`RateLimiter::check`] with an explicit clock.
    pub fn check_at(
        &self,
        identifier: &str,
        window: Duration,
        max_requests: u32,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entries = self.entries();
        let entry = entries
            .entry(identifier.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: now + window,
            });

        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        entry.count = entry.count.saturating_add(1);

        RateLimitDecision {
            allowed: entry.count <= max_requests,
            remaining: max_requests.saturating_sub(entry.count),
            reset_at: entry.reset_at,
        }
    }

    /// Remove entries whose window has ended.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Same as [`RateLimiter::sweep`] with an explicit clock.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no identifiers are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a background task that sweeps every `interval`.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(removed, "Rate limit entries swept");
                }
            }
        })
    }
}
