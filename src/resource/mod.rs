//! Data model of scheduled objects.
//!
//! - [`ObjectKey`] namespaced identity
//! - [`DesiredState`] user-declared spec ([`Action`], [`Mode`], targets, window)
//! - [`ObservedStatus`] status written by the reconciler ([`Phase`])

mod desired;
mod key;
mod status;

pub use desired::{Action, DesiredState, InstanceId, MAX_INSTANCE_ID_LEN, Mode, TargetError};
pub use key::{DEFAULT_NAMESPACE, ObjectKey};
pub use status::{ObservedStatus, Phase};
