//! # Re-check cadence for windowed objects.
//!
//! Windowed objects are re-evaluated on a fixed base interval with jitter, so a
//! fleet of objects declared at the same moment spreads its re-checks instead
//! of hitting the store and the cloud API together.
//!
//! Default: 60s ± 50%, i.e. a re-check somewhere in `[30s, 90s]`.

use std::time::Duration;

use super::jitter::JitterPolicy;

/// Base interval plus jitter for periodic re-checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequeuePolicy {
    pub base: Duration,
    pub jitter: JitterPolicy,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            jitter: JitterPolicy::Spread { percent: 50 },
        }
    }
}

impl RequeuePolicy {
    /// Next re-check delay.
    pub fn next(&self) -> Duration {
        self.jitter.apply(self.base)
    }

    /// Range [`next`](Self::next) draws from.
    pub fn bounds(&self) -> (Duration, Duration) {
        self.jitter.bounds(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sixty_seconds_plus_minus_half() {
        let policy = RequeuePolicy::default();
        assert_eq!(policy.bounds(), (Duration::from_secs(30), Duration::from_secs(90)));
        for _ in 0..100 {
            let d = policy.next();
            assert!(d >= Duration::from_secs(30) && d <= Duration::from_secs(90));
        }
    }

    #[test]
    fn without_jitter_returns_base() {
        let policy = RequeuePolicy {
            base: Duration::from_millis(250),
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(), Duration::from_millis(250));
    }
}
