//! Failed-login limiter
//!
//! Counts failed logins per email address inside a sliding window. Once an
//! address reaches the limit, further attempts are refused until the oldest
//! failure leaves the window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Failed attempts allowed inside one window
pub const MAX_FAILED_ATTEMPTS: usize = 5;

/// Window length in minutes
pub const WINDOW_MINUTES: i64 = 15;

/// Login rate limiter keyed by lower-cased email
#[derive(Default)]
pub struct LoginRateLimiter {
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn cutoff() -> DateTime<Utc> {
        Utc::now() - Duration::minutes(WINDOW_MINUTES)
    }

    /// Whether this email has used up its failed attempts
    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Self::cutoff();

        match attempts.get_mut(&email.to_lowercase()) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= MAX_FAILED_ATTEMPTS
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear(&self, email: &str) {
        self.attempts.write().await.remove(&email.to_lowercase());
    }

    /// Drop expired entries. Called periodically from a background task.
    pub async fn cleanup(&self) {
        let cutoff = Self::cutoff();
        self.attempts.write().await.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    /// Number of emails currently tracked
    pub async fn tracked(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_after_max_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            limiter.record_failure("buyer@example.com").await;
        }
        assert!(!limiter.is_limited("buyer@example.com").await);

        limiter.record_failure("buyer@example.com").await;
        assert!(limiter.is_limited("buyer@example.com").await);

        limiter.clear("buyer@example.com").await;
        assert!(!limiter.is_limited("buyer@example.com").await);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for email in ["A@X.IO", "a@x.io", "A@x.io", "a@X.io", "a@x.IO"] {
            limiter.record_failure(email).await;
        }
        assert!(limiter.is_limited("a@x.io").await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failure("a@x.io").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 1);
        assert!(!limiter.is_limited("nobody@x.io").await);
        assert_eq!(limiter.tracked().await, 1);
    }
}
