//! # Backoff policy for retrying failed reconciles.
//!
//! [`BackoffPolicy`] controls how the retry delay grows while a key keeps
//! failing with a retryable error (executor failure, store error, status
//! conflict). It is parameterized by:
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for failure `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`, then jittered. The base is derived from the failure count alone, so
//! jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use instancevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(3), Duration::from_secs(8));
//! assert_eq!(backoff.next(10), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// 1s doubling up to 5 minutes, equal jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(300),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given failure number (0-indexed).
    pub fn next(&self, failures: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = failures.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn doubles_until_cap() {
        let policy = exact(500, 10_000, 2.0);
        let delays: Vec<u64> = (0..7).map(|n| policy.next(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn constant_factor_keeps_first() {
        let policy = exact(750, 30_000, 1.0);
        assert!((0..20).all(|n| policy.next(n) == Duration::from_millis(750)));
    }

    #[test]
    fn first_above_max_is_clamped() {
        assert_eq!(exact(20_000, 5_000, 2.0).next(0), Duration::from_millis(5_000));
    }

    #[test]
    fn overflowing_exponent_clamps_to_max() {
        let policy = exact(100, 60_000, 2.0);
        assert_eq!(policy.next(200), Duration::from_secs(60));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn default_policy_equal_jitter_bounds() {
        let policy = BackoffPolicy::default();
        for n in 0..12 {
            let base = (1_000.0 * 2.0f64.powi(n as i32)).min(300_000.0) as u64;
            let delay = policy.next(n).as_millis() as u64;
            assert!(delay >= base / 2 && delay <= base, "failure {n}: {delay}ms vs base {base}ms");
        }
    }
}
