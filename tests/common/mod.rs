#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use tokio_util::sync::CancellationToken;

use instancevisor::{
    ActionExecutor, ActionRequest, DesiredState, ExecutorError, MemoryStore, ObjectKey,
    ObservedStatus, Resource, StatusStore, StoreError,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 2024-05-15 (a Wednesday) at `h:m:s` in Asia/Kolkata.
pub fn kolkata(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Kolkata
        .with_ymd_and_hms(2024, 5, 15, h, m, s)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new("ops", name)
}

/// Executor double: records every call, can fail a number of times, can be slow.
#[derive(Default)]
pub struct RecordingExecutor {
    requests: Mutex<Vec<ActionRequest>>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    cancelled: AtomicBool,
    failures_left: AtomicU32,
    always_fail: AtomicBool,
    delay: Mutex<Duration>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let exec = Self::default();
        exec.always_fail.store(true, Ordering::SeqCst);
        Arc::new(exec)
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn failing_times(n: u32) -> Arc<Self> {
        let exec = Self::default();
        exec.failures_left.store(n, Ordering::SeqCst);
        Arc::new(exec)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        let exec = Self::default();
        *exec.delay.lock().unwrap() = delay;
        Arc::new(exec)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn saw_cancel(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(
        &self,
        request: &ActionRequest,
        ctx: CancellationToken,
    ) -> Result<(), ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        let res = tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = ctx.cancelled() => {
                self.cancelled.store(true, Ordering::SeqCst);
                Err(ExecutorError::Canceled)
            }
        };
        self.running.fetch_sub(1, Ordering::SeqCst);
        res?;

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(ExecutorError::failed("UnauthorizedOperation"));
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(ExecutorError::failed("RequestLimitExceeded"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Store wrapper that rejects the next `n` status writes with a conflict,
/// bumping the inner version the way a concurrent writer would.
pub struct ConflictingStore {
    pub inner: MemoryStore,
    conflicts_left: AtomicU32,
}

impl ConflictingStore {
    pub fn new(conflicts: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
        })
    }
}

#[async_trait]
impl StatusStore for ConflictingStore {
    async fn fetch(&self, key: &ObjectKey) -> Result<Option<Resource>, StoreError> {
        self.inner.fetch(key).await
    }

    async fn patch_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &ObservedStatus,
    ) -> Result<u64, StoreError> {
        let left = self.conflicts_left.load(Ordering::SeqCst);
        if left > 0 {
            self.conflicts_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected: resource_version,
                actual: resource_version + 1,
            });
        }
        self.inner.patch_status(key, resource_version, status).await
    }
}

/// Store wrapper that applies `edit` right before the first status write,
/// the way a user editing the object mid-pass would.
pub struct EditingStore {
    pub inner: MemoryStore,
    edit: Mutex<Option<DesiredState>>,
}

impl EditingStore {
    pub fn new(edit: DesiredState) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            edit: Mutex::new(Some(edit)),
        })
    }
}

#[async_trait]
impl StatusStore for EditingStore {
    async fn fetch(&self, key: &ObjectKey) -> Result<Option<Resource>, StoreError> {
        self.inner.fetch(key).await
    }

    async fn patch_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: &ObservedStatus,
    ) -> Result<u64, StoreError> {
        let edit = self.edit.lock().unwrap().take();
        if let Some(spec) = edit {
            self.inner.apply(key.clone(), spec).await;
        }
        self.inner.patch_status(key, resource_version, status).await
    }
}

/// Store whose reads never complete; used to hold a pass past the grace period.
pub struct HangingStore;

#[async_trait]
impl StatusStore for HangingStore {
    async fn fetch(&self, _key: &ObjectKey) -> Result<Option<Resource>, StoreError> {
        std::future::pending().await
    }

    async fn patch_status(
        &self,
        _key: &ObjectKey,
        _resource_version: u64,
        _status: &ObservedStatus,
    ) -> Result<u64, StoreError> {
        std::future::pending().await
    }
}

/// Polls `check` every 10ms for up to 5s.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Polls the store until `key` carries the status `label`.
pub async fn wait_for_status(store: &MemoryStore, key: &ObjectKey, label: &str) -> bool {
    for _ in 0..500 {
        if store.status(key).await.is_some_and(|st| st.label() == label) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
