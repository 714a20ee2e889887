//! Keyed rate limiting
//!
//! One windowed counter table keyed by caller identity and request
//! category. The pipeline depends only on the [`RateLimiter`] trait; the
//! in-process implementation suits single-instance deployments, and a
//! deployment fronted by an external keyed store can swap in its own
//! implementation without touching the pipeline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::error::AppError;

/// Window applied to every category.
const WINDOW: Duration = Duration::from_secs(3600);

/// Entry count that triggers a lazy sweep of expired counters.
const SWEEP_THRESHOLD: usize = 1024;

/// Request categories with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    Upload,
    Export,
    General,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Upload => "upload",
            RateCategory::Export => "export",
            RateCategory::General => "general",
        }
    }

    fn budget(&self, limits: &LimitsConfig) -> u32 {
        match self {
            RateCategory::Upload => limits.uploads_per_hour,
            RateCategory::Export => limits.exports_per_hour,
            RateCategory::General => limits.requests_per_hour,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Keyed rate limiter interface.
pub trait RateLimiter: Send + Sync {
    /// Record one hit against `key` and decide whether it is allowed.
    fn allow(&self, key: &str, limit: u32, window: Duration) -> RateDecision;
}

struct WindowCounter {
    expires_at: Instant,
    count: u32,
}

/// In-process TTL-windowed rate limiter.
///
/// Counters expire on a rolling window and are swept lazily once the
/// table grows past a threshold, so idle keys cost nothing.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    entries: Mutex<HashMap<String, WindowCounter>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn allow(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        let now = Instant::now();
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            // a poisoned lock only means another check panicked; the
            // counters are still sound
            Err(poisoned) => poisoned.into_inner(),
        };

        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, counter| counter.expires_at > now);
        }

        let counter = entries.entry(key.to_string()).or_insert(WindowCounter {
            expires_at: now + window,
            count: 0,
        });

        if counter.expires_at <= now {
            counter.expires_at = now + window;
            counter.count = 0;
        }

        if counter.count >= limit {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_after: counter.expires_at.saturating_duration_since(now),
            };
        }

        counter.count += 1;
        RateDecision {
            allowed: true,
            remaining: limit - counter.count,
            reset_after: counter.expires_at.saturating_duration_since(now),
        }
    }
}

/// Enforce a category budget for one caller, mapping denial to HTTP 429.
pub fn enforce(
    limiter: &dyn RateLimiter,
    limits: &LimitsConfig,
    category: RateCategory,
    owner_id: Uuid,
) -> Result<(), AppError> {
    let key = format!("{}:{}", category.as_str(), owner_id);
    let decision = limiter.allow(&key, category.budget(limits), WINDOW);

    if !decision.allowed {
        tracing::warn!(
            owner_id = %owner_id,
            category = category.as_str(),
            "rate limit exceeded"
        );
        return Err(AppError::RateLimited {
            retry_after_secs: decision.reset_after.as_secs(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = InMemoryRateLimiter::new();
        let window = Duration::from_secs(60);

        for i in 0..5 {
            let decision = limiter.allow("k", 5, window);
            assert!(decision.allowed, "hit {i} should be allowed");
            assert_eq!(decision.remaining, 4 - i);
        }

        let decision = limiter.allow("k", 5, window);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = InMemoryRateLimiter::new();
        let window = Duration::from_secs(60);

        assert!(limiter.allow("a", 1, window).allowed);
        assert!(!limiter.allow("a", 1, window).allowed);
        assert!(limiter.allow("b", 1, window).allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = InMemoryRateLimiter::new();
        let window = Duration::from_millis(10);

        assert!(limiter.allow("k", 1, window).allowed);
        assert!(!limiter.allow("k", 1, window).allowed);

        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.allow("k", 1, window).allowed);
    }

    #[test]
    fn test_enforce_maps_to_rate_limited_error() {
        let limiter = InMemoryRateLimiter::new();
        let limits = LimitsConfig {
            uploads_per_hour: 1,
            ..LimitsConfig::default()
        };
        let owner = Uuid::new_v4();

        assert!(enforce(&limiter, &limits, RateCategory::Upload, owner).is_ok());
        let err = enforce(&limiter, &limits, RateCategory::Upload, owner).unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }

    #[test]
    fn test_categories_do_not_share_budget() {
        let limiter = InMemoryRateLimiter::new();
        let limits = LimitsConfig {
            uploads_per_hour: 1,
            exports_per_hour: 1,
            ..LimitsConfig::default()
        };
        let owner = Uuid::new_v4();

        assert!(enforce(&limiter, &limits, RateCategory::Upload, owner).is_ok());
        assert!(enforce(&limiter, &limits, RateCategory::Export, owner).is_ok());
    }
}
