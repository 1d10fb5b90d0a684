//! # Jitter policy for re-check and retry delays.
//!
//! [`JitterPolicy`] adds randomness to delays so that many objects re-checked on
//! the same cadence do not hit the store and the cloud API in lockstep.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Full`] random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Spread`] random delay in `[delay - p%, delay + p%]`

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the exact delay.
    #[default]
    None,

    /// Random delay in `[0, delay]`; most aggressive spreading.
    Full,

    /// `delay/2 + random[0, delay/2]`; keeps ~75% of the delay on average.
    Equal,

    /// Symmetric spread around the delay: `delay ± percent%`.
    ///
    /// Percentages above 100 are clamped to 100.
    Spread {
        percent: u8,
    },
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
            JitterPolicy::Spread { percent } => spread_jitter(delay, *percent),
        }
    }

    /// Smallest and largest delay [`apply`](Self::apply) can return for `delay`.
    pub fn bounds(&self, delay: Duration) -> (Duration, Duration) {
        match self {
            JitterPolicy::None => (delay, delay),
            JitterPolicy::Full => (Duration::ZERO, delay),
            JitterPolicy::Equal => (delay / 2, delay),
            JitterPolicy::Spread { percent } => {
                let span = spread_span(delay, *percent);
                (delay.saturating_sub(span), delay.saturating_add(span))
            }
        }
    }
}

/// random[0, delay]
fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

/// delay/2 + random[0, delay/2]
fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let jitter = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + jitter)
}

/// random[delay - span, delay + span]
fn spread_jitter(delay: Duration, percent: u8) -> Duration {
    let ms = delay.as_millis() as u64;
    let span = spread_span(delay, percent).as_millis() as u64;
    if span == 0 {
        return delay;
    }
    let low = ms.saturating_sub(span);
    let high = ms.saturating_add(span);
    Duration::from_millis(rand::rng().random_range(low..=high))
}

fn spread_span(delay: Duration, percent: u8) -> Duration {
    let ms = delay.as_millis() as u64;
    Duration::from_millis(ms.saturating_mul(u64::from(percent.min(100))) / 100)
}
