//! # Desired state declared by the user.
//!
//! [`DesiredState`] is the spec half of a scheduled object: which instances,
//! which [`Action`], and in which [`Mode`]. It is read-only to the reconciler.
//!
//! Deserialization follows the CRD layout (`camelCase` fields) and also accepts
//! the legacy spellings used by earlier manifests:
//!
//! | field    | canonical              | also accepted            |
//! |----------|------------------------|--------------------------|
//! | `action` | `Start`, `Stop`        | `START`, `STOP`, `start` |
//! | `mode`   | `Immediate`, `Windowed`| `OnDemand`, `Scheduled`  |
//!
//! Any other `mode` value becomes [`Mode::Unrecognized`] instead of failing the
//! whole object, so the reconciler can report it as a configuration problem.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation to apply to every target instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(alias = "START", alias = "start")]
    Start,
    #[serde(alias = "STOP", alias = "stop")]
    Stop,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "Start",
            Action::Stop => "Stop",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When the action is allowed to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Run once, right away.
    #[serde(alias = "OnDemand")]
    Immediate,
    /// Run on every pass whose instant falls inside the daily window.
    #[serde(alias = "Scheduled")]
    Windowed,
    /// Any value the controller does not understand.
    #[serde(other)]
    Unrecognized,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Immediate => "Immediate",
            Mode::Windowed => "Windowed",
            Mode::Unrecognized => "Unrecognized",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest identifier accepted as a target.
pub const MAX_INSTANCE_ID_LEN: usize = 64;

/// Target identifier that passed syntax validation.
///
/// Only `[A-Za-z0-9_-]`, 1..=64 characters, and no leading `-` (so an id can
/// never be mistaken for a command-line flag).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let reason = if raw.is_empty() {
            Some("empty identifier")
        } else if raw.len() > MAX_INSTANCE_ID_LEN {
            Some("identifier longer than 64 characters")
        } else if raw.starts_with('-') {
            Some("identifier starts with '-'")
        } else if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            Some("identifier contains characters outside [A-Za-z0-9_-]")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TargetError::Invalid {
                value: raw.to_string(),
                reason,
            }),
            None => Ok(Self(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a target list was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("no target instances declared")]
    Empty,

    #[error("invalid target {value:?}: {reason}")]
    Invalid { value: String, reason: &'static str },
}

/// User-declared desired state of a set of instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    /// Opaque instance identifiers the action applies to.
    pub targets: Vec<String>,
    pub action: Action,
    /// `None` when the field is absent from the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Window opening time, `HH:MM:SS` in the reference timezone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<String>,
    /// Window closing time, `HH:MM:SS` in the reference timezone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<String>,
}

impl DesiredState {
    /// Immediate-mode state for the given targets.
    pub fn immediate<I, S>(action: Action, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            action,
            mode: Some(Mode::Immediate),
            window_start: None,
            window_end: None,
        }
    }

    /// Windowed-mode state with `start`/`end` boundaries.
    pub fn windowed<I, S>(
        action: Action,
        targets: I,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            action,
            mode: Some(Mode::Windowed),
            window_start: Some(start.into()),
            window_end: Some(end.into()),
        }
    }

    /// Validates every target, preserving declaration order and dropping duplicates.
    pub fn validated_targets(&self) -> Result<Vec<InstanceId>, TargetError> {
        if self.targets.is_empty() {
            return Err(TargetError::Empty);
        }
        let mut ids: Vec<InstanceId> = Vec::with_capacity(self.targets.len());
        for raw in &self.targets {
            let id = InstanceId::parse(raw)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}
