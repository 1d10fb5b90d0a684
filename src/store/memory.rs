//! # In-memory store.
//!
//! Objects live in a `HashMap` behind a `tokio::sync::RwLock`. `apply` plays
//! the part of the API server: it creates or updates a spec, bumping the
//! generation only when the spec actually changed.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Resource, StatusStore};
use crate::error::StoreError;
use crate::resource::{DesiredState, ObjectKey, ObservedStatus};

/// `HashMap`-backed [`StatusStore`].
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectKey, Resource>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or updates the spec of `key`; returns the resulting generation.
    ///
    /// Re-applying an identical spec is a no-op.
    pub async fn apply(&self, key: ObjectKey, spec: DesiredState) -> u64 {
        let mut objects = self.objects.write().await;
        match objects.get_mut(&key) {
            Some(res) if res.spec == spec => res.generation,
            Some(res) => {
                res.spec = spec;
                res.generation += 1;
                res.resource_version += 1;
                res.generation
            }
            None => {
                objects.insert(
                    key.clone(),
                    Resource {
                        key,
                        generation: 1,
                        resource_version: 1,
                        spec,
                        status: None,
                    },
                );
                1
            }
        }
    }

    /// Removes `key` together with its status. Returns whether it existed.
    pub async fn delete(&self, key: &ObjectKey) -> bool {
        self.objects.write().await.remove(key).is_some()
    }

    /// Current status of `key`, if any.
    pub async fn status(&self, key: &ObjectKey) -> Option<ObservedStatus> {
        self.objects
            .read()
            .await
            .get(key)
            .and_then(|res| res.status.clone())
    }

    /// All keys, sorted.
    pub async fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn fetch(&self, key: &ObjectKey) -> Result<Option<Resource>, StoreError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn patch_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &ObservedStatus,
    ) -> Result<u64, StoreError> {
        let mut objects = self.objects.write().await;
        let res = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        if res.resource_version != resource_version {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: resource_version,
                actual: res.resource_version,
            });
        }

        res.status = Some(status.clone());
        res.resource_version += 1;
        Ok(res.resource_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Action, Mode, Phase};

    fn key() -> ObjectKey {
        ObjectKey::new("default", "nightly")
    }

    #[tokio::test]
    async fn generation_only_moves_on_spec_change() {
        let store = MemoryStore::new();
        let spec = DesiredState::immediate(Action::Stop, ["i-1"]);

        assert_eq!(store.apply(key(), spec.clone()).await, 1);
        assert_eq!(store.apply(key(), spec).await, 1);
        assert_eq!(
            store
                .apply(key(), DesiredState::immediate(Action::Start, ["i-1"]))
                .await,
            2
        );
    }

    #[tokio::test]
    async fn stale_version_conflicts() {
        let store = MemoryStore::new();
        store
            .apply(key(), DesiredState::immediate(Action::Stop, ["i-1"]))
            .await;
        let res = store.fetch(&key()).await.unwrap().unwrap();
        let st = ObservedStatus::new(Mode::Immediate, Phase::InProgress, res.generation);

        let v2 = store
            .patch_status(&key(), res.resource_version, &st)
            .await
            .unwrap();
        assert_eq!(v2, res.resource_version + 1);

        let err = store
            .patch_status(&key(), res.resource_version, &st)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual, .. } if actual == v2));
    }

    #[tokio::test]
    async fn status_goes_away_with_the_object() {
        let store = MemoryStore::new();
        store
            .apply(key(), DesiredState::immediate(Action::Stop, ["i-1"]))
            .await;
        assert!(store.delete(&key()).await);
        assert!(store.status(&key()).await.is_none());

        let st = ObservedStatus::new(Mode::Immediate, Phase::Completed, 1);
        let err = store.patch_status(&key(), 1, &st).await.unwrap_err();
        assert_eq!(err.as_label(), "store_not_found");
    }
}
