//! Admission Limiter
//!
//! A single token bucket shared by every endpoint. It refills at `rate`
//! tokens per second and holds at most `2 × rate`, so a quiet service admits
//! a short burst before falling back to the steady rate.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};

/// Rate limit decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request allowed
    Allowed,
    /// Request denied with retry-after duration
    Denied { retry_after: Duration },
}

impl RateLimitDecision {
    /// Whether the request was admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decides whether a request may proceed.
pub trait AdmissionLimiter: Send + Sync {
    /// Consumes one token if available.
    fn check(&self) -> RateLimitDecision;

    /// Consumes one token if available; `false` means reject.
    fn allow(&self) -> bool {
        self.check().is_allowed()
    }
}

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide token bucket.
pub struct TokenBucketLimiter {
    limiter: DirectLimiter,
    clock: DefaultClock,
    rate: NonZeroU32,
    burst: NonZeroU32,
}

impl TokenBucketLimiter {
    /// Creates a bucket refilling at `rate` per second with capacity `2 × rate`.
    #[must_use]
    pub fn new(rate: NonZeroU32) -> Self {
        let burst = rate.saturating_mul(NonZeroU32::MIN.saturating_add(1));
        let quota = Quota::per_second(rate).allow_burst(burst);
        Self {
            limiter: GovRateLimiter::direct(quota),
            clock: DefaultClock::default(),
            rate,
            burst,
        }
    }

    /// Tokens added per second.
    #[must_use]
    pub const fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    /// Bucket capacity.
    #[must_use]
    pub const fn burst(&self) -> NonZeroU32 {
        self.burst
    }
}

impl AdmissionLimiter for TokenBucketLimiter {
    fn check(&self) -> RateLimitDecision {
        match self.limiter.check() {
            Ok(()) => RateLimitDecision::Allowed,
            Err(not_until) => RateLimitDecision::Denied {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("rate", &self.rate)
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rate: u32) -> TokenBucketLimiter {
        TokenBucketLimiter::new(NonZeroU32::new(rate).unwrap())
    }

    #[test]
    fn test_burst_is_twice_the_rate() {
        let limiter = limiter(5);
        assert_eq!(limiter.rate().get(), 5);
        assert_eq!(limiter.burst().get(), 10);
    }

    #[test]
    fn test_full_bucket_admits_burst_then_denies() {
        let limiter = limiter(3);

        for _ in 0..6 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());
    }

    #[test]
    fn test_denial_carries_wait_time() {
        let limiter = limiter(1);
        assert!(limiter.allow());
        assert!(limiter.allow());

        match limiter.check() {
            RateLimitDecision::Denied { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(1));
            }
            RateLimitDecision::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_huge_rate_does_not_overflow() {
        let limiter = limiter(u32::MAX);
        assert_eq!(limiter.burst().get(), u32::MAX);
    }
}
