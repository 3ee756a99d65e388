//! Keyed query cache with in-flight deduplication.
//!
//! Concurrent `get_or_fetch` calls for one key share a single fetch. Values
//! are written only when a fetch succeeds; failures are not cached. An
//! invalidated key starts over on the next call, and a fetch that was already
//! in flight when its key was invalidated never becomes visible.

use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

/// Cache key (e.g. `"current-user"`, `"/cameras"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Cow<'static, str>);

impl QueryKey {
    pub const fn from_static(key: &'static str) -> Self {
        Self(Cow::Borrowed(key))
    }

    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const CURRENT_USER: QueryKey = QueryKey::from_static("current-user");

type Slot<V> = Arc<OnceCell<Arc<V>>>;

#[derive(Debug)]
pub struct QueryCache<V> {
    slots: Mutex<HashMap<QueryKey, Slot<V>>>,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &QueryKey) -> Slot<V> {
        Arc::clone(self.slots().entry(key.clone()).or_default())
    }

    /// Cached value or the result of `fetch`, with at most one fetch in
    /// flight per key.
    pub async fn get_or_fetch<E, F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        if let Some(value) = slot.get() {
            return Ok(Arc::clone(value));
        }

        let value = slot
            .get_or_try_init(|| async {
                tracing::debug!(key = %key, "query cache miss; fetching");
                fetch().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(value))
    }

    /// Latest committed value, without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<Arc<V>> {
        self.slots().get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn invalidate(&self, key: &QueryKey) {
        if self.slots().remove(key).is_some() {
            tracing::debug!(key = %key, "query invalidated");
        }
    }

    pub fn clear(&self) {
        self.slots().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn slow_fetch(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(value)
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = QueryCache::<u32>::new();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::from_static("k");

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(&key, || slow_fetch(&calls, 1)),
            cache.get_or_fetch(&key, || slow_fetch(&calls, 2)),
            cache.get_or_fetch(&key, || slow_fetch(&calls, 3)),
        );

        assert_eq!((*a.unwrap(), *b.unwrap(), *c.unwrap()), (1, 1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek(&key).as_deref(), Some(&1));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = QueryCache::<u32>::new();
        let key = QueryKey::new("flaky".to_string());

        let first: Result<_, String> = cache.get_or_fetch(&key, || async { Err("down".to_string()) }).await;
        assert_eq!(first.unwrap_err(), "down");
        assert!(cache.peek(&key).is_none());

        let second: Result<_, String> = cache.get_or_fetch(&key, || async { Ok(9) }).await;
        assert_eq!(*second.unwrap(), 9);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch_and_hides_stale_flight() {
        let cache = QueryCache::<u32>::new();
        let calls = AtomicUsize::new(0);
        let key = CURRENT_USER;

        let in_flight = cache.get_or_fetch(&key, || slow_fetch(&calls, 1));
        let invalidate = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.invalidate(&key);
        };
        let (stale, ()) = tokio::join!(in_flight, invalidate);

        // The caller that started the fetch still gets its answer...
        assert_eq!(*stale.unwrap(), 1);
        // ...but it was never committed under the invalidated key.
        assert!(cache.peek(&key).is_none());

        let fresh = cache.get_or_fetch(&key, || slow_fetch(&calls, 2)).await.unwrap();
        assert_eq!(*fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
