//! Windowed login-attempt limiter.
//!
//! Tracks per-username attempt timestamps in memory; resets on process
//! restart. Safe to share via `Arc<RateLimiter>` across async tasks.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

/// In-memory rate limiter — tracks per-key attempt timestamps.
pub struct RateLimiter {
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    max_attempts: usize,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts,
            window_secs,
        }
    }

    /// Check `key` against the limit. Returns `true` if the request is allowed,
    /// `false` if it is rate-limited. Records the attempt on `true`.
    pub fn check_and_record(&self, key: &str) -> bool {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let window = std::time::Duration::from_secs(self.window_secs);

        let entry = attempts.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < window);

        if entry.len() >= self.max_attempts {
            return false;
        }
        entry.push(now);
        true
    }

    /// Remove entries that have expired (call periodically to free memory).
    pub fn cleanup(&self) {
        let mut attempts = self.attempts.lock();
        let now = Instant::now();
        let window = std::time::Duration::from_secs(self.window_secs);
        attempts.retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < window);
            !entries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_within_limit() {
        let l = RateLimiter::new(3, 60);
        assert!(l.check_and_record("mario"));
        assert!(l.check_and_record("mario"));
        assert!(l.check_and_record("mario"));
    }

    #[test]
    fn blocks_over_limit() {
        let l = RateLimiter::new(3, 60);
        l.check_and_record("mario");
        l.check_and_record("mario");
        l.check_and_record("mario");
        assert!(!l.check_and_record("mario"));
    }

    #[test]
    fn keys_are_independent() {
        let l = RateLimiter::new(2, 60);
        l.check_and_record("mario");
        l.check_and_record("mario");
        assert!(!l.check_and_record("mario")); // blocked

        assert!(l.check_and_record("giulia")); // independent
    }

    #[test]
    fn cleanup_keeps_live_entries() {
        let l = RateLimiter::new(2, 60);
        l.check_and_record("mario");
        l.cleanup();
        l.check_and_record("mario");
        assert!(!l.check_and_record("mario"));
    }
}
