//! # Runtime configuration.
//!
//! [`Config`] gathers every tunable of the scheduler: shutdown grace, global
//! concurrency, event bus size, executor timeout, re-check cadence, retry
//! backoff, window evaluation and controller queue settings.
//!
//! It can be built in code (`Config::default()` plus field edits) or loaded
//! from TOML with [`Config::from_toml_str`] / [`Config::load`]. Every TOML key
//! is optional; missing keys keep their defaults.
//!
//! ```toml
//! grace_secs = 30
//! max_concurrent = 8
//! executor_timeout_secs = 10
//!
//! [requeue]
//! base_secs = 60
//! jitter_percent = 50
//!
//! [retry]
//! first_ms = 1000
//! max_secs = 300
//! factor = 2.0
//! jitter = "equal"
//!
//! [window]
//! timezone = "Asia/Kolkata"
//! boundary = "exclusive"
//! weekend_override = false
//!
//! [controller]
//! queue_capacity = 1024
//! admission = "coalesce"
//! ```
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `executor_timeout = 0s` → no timeout

use std::path::Path;
use std::time::Duration;

use chrono::Weekday;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::controller::ControllerConfig;
use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy, RequeuePolicy};
use crate::window::{BoundaryMode, WindowConfig};

use super::reconciler::{DEFAULT_EXECUTOR_TIMEOUT, DEFAULT_STATUS_RETRIES};

/// Global configuration for the scheduler runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for in-flight reconciles on shutdown
/// - `max_concurrent`: reconciles running at once across all keys (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `executor_timeout`: bound on one executor call (`0s` = no timeout)
/// - `requeue`: re-check cadence of windowed objects
/// - `retry`: backoff after retryable failures
/// - `status_retries`: status write attempts before giving up on conflicts
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown every in-flight reconcile is cancelled and the scheduler
    /// waits up to `grace` before returning `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Maximum number of reconciles running concurrently (`0` = unlimited).
    ///
    /// Per-key serialization holds regardless of this value.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    pub executor_timeout: Duration,
    pub requeue: RequeuePolicy,
    pub retry: BackoffPolicy,
    pub status_retries: u32,
    pub window: WindowConfig,
    pub controller: ControllerConfig,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the executor timeout as an `Option` (`None` = no timeout).
    #[inline]
    pub fn executor_timeout(&self) -> Option<Duration> {
        if self.executor_timeout == Duration::ZERO {
            None
        } else {
            Some(self.executor_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Parses a TOML document on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.into_config()
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `executor_timeout = 10s`
    /// - `requeue = 60s ± 50%`
    /// - `retry = 1s doubling to 5min, equal jitter`
    /// - `status_retries = 3`
    /// - `window`: `Asia/Kolkata`, exclusive boundaries, no weekend override
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            max_concurrent: 0,
            bus_capacity: 1024,
            executor_timeout: DEFAULT_EXECUTOR_TIMEOUT,
            requeue: RequeuePolicy::default(),
            retry: BackoffPolicy::default(),
            status_retries: DEFAULT_STATUS_RETRIES,
            window: WindowConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    grace_secs: Option<u64>,
    max_concurrent: Option<usize>,
    bus_capacity: Option<usize>,
    executor_timeout_secs: Option<u64>,
    status_retries: Option<u32>,
    requeue: RequeueSection,
    retry: RetrySection,
    window: WindowSection,
    controller: ControllerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RequeueSection {
    base_secs: Option<u64>,
    jitter_percent: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetrySection {
    first_ms: Option<u64>,
    max_secs: Option<u64>,
    factor: Option<f64>,
    jitter: Option<JitterName>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JitterName {
    None,
    Full,
    Equal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WindowSection {
    timezone: Option<String>,
    boundary: Option<BoundaryMode>,
    weekend_override: bool,
    always_open_days: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ControllerSection {
    queue_capacity: Option<usize>,
    admission: Option<crate::controller::AdmissionPolicy>,
}

impl ConfigFile {
    fn into_config(self) -> Result<Config, ConfigError> {
        let mut cfg = Config::default();

        if let Some(secs) = self.grace_secs {
            cfg.grace = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_concurrent {
            cfg.max_concurrent = n;
        }
        if let Some(n) = self.bus_capacity {
            cfg.bus_capacity = n;
        }
        if let Some(secs) = self.executor_timeout_secs {
            cfg.executor_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.status_retries {
            cfg.status_retries = n.max(1);
        }

        if let Some(secs) = self.requeue.base_secs {
            cfg.requeue.base = Duration::from_secs(secs);
        }
        if let Some(percent) = self.requeue.jitter_percent {
            cfg.requeue.jitter = match percent {
                0 => JitterPolicy::None,
                p => JitterPolicy::Spread { percent: p },
            };
        }

        if let Some(ms) = self.retry.first_ms {
            cfg.retry.first = Duration::from_millis(ms);
        }
        if let Some(secs) = self.retry.max_secs {
            cfg.retry.max = Duration::from_secs(secs);
        }
        if let Some(factor) = self.retry.factor {
            cfg.retry.factor = factor;
        }
        if let Some(jitter) = self.retry.jitter {
            cfg.retry.jitter = match jitter {
                JitterName::None => JitterPolicy::None,
                JitterName::Full => JitterPolicy::Full,
                JitterName::Equal => JitterPolicy::Equal,
            };
        }

        if let Some(tz) = self.window.timezone {
            cfg.window.timezone = tz
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(tz.clone()))?;
        }
        if let Some(boundary) = self.window.boundary {
            cfg.window.boundary = boundary;
        }
        for day in self.window.always_open_days {
            let weekday = day
                .parse::<Weekday>()
                .map_err(|_| ConfigError::InvalidWeekday(day.clone()))?;
            if !cfg.window.always_open_days.contains(&weekday) {
                cfg.window.always_open_days.push(weekday);
            }
        }
        if self.window.weekend_override {
            cfg.window = cfg.window.with_weekend_override();
        }

        if let Some(n) = self.controller.queue_capacity {
            cfg.controller.queue_capacity = n.max(1);
        }
        if let Some(admission) = self.controller.admission {
            cfg.controller.admission = admission;
        }

        Ok(cfg)
    }
}
