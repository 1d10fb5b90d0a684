use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespace used when a key is parsed without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespaced identity of a desired-state object (`namespace/name`).
///
/// Keys are the unit of serialization in the controller: at most one reconcile
/// pass runs per key at any time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = std::convert::Infallible;

    /// Parses `namespace/name`; a bare `name` lands in [`DEFAULT_NAMESPACE`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('/') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new(DEFAULT_NAMESPACE, s),
        })
    }
}
