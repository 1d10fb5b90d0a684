//! # Desired-state store.
//!
//! The reconciler reads objects and writes their status through
//! [`StatusStore`]. Writes are partial: only the status half of a
//! [`Resource`] is ever touched, guarded by the `resource_version` the caller
//! read (optimistic concurrency).
//!
//! ```text
//! fetch(key) ──► Resource { generation, resource_version, spec, status }
//!                                          │
//! patch_status(key, resource_version, st) ─┘──► Ok(new version) | Conflict
//! ```
//!
//! [`MemoryStore`] is the in-process implementation; a control-plane backed
//! store implements the same trait.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::resource::{DesiredState, ObjectKey, ObservedStatus};

/// Snapshot of one desired-state object as returned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub key: ObjectKey,
    /// Bumped on every spec change.
    pub generation: u64,
    /// Bumped on every write (spec or status).
    pub resource_version: u64,
    pub spec: DesiredState,
    pub status: Option<ObservedStatus>,
}

/// Read objects, write their status.
#[async_trait]
pub trait StatusStore: Send + Sync + 'static {
    /// Returns `Ok(None)` when the object does not exist.
    async fn fetch(&self, key: &ObjectKey) -> Result<Option<Resource>, StoreError>;

    /// Replaces the status of `key` if its current version is still
    /// `resource_version`; returns the new version.
    ///
    /// # Errors
    /// - [`StoreError::Conflict`] if the object changed since it was read.
    /// - [`StoreError::NotFound`] if the object was deleted.
    async fn patch_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &ObservedStatus,
    ) -> Result<u64, StoreError>;
}
