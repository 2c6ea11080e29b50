//! TTL response cache with request coalescing and prefix invalidation.
//!
//! Read operations against the remote service are cached under string keys
//! composed from the operation name and the path it concerns. Concurrent
//! requests for the same key share a single in-flight computation, and
//! mutating operations drop every cached view whose key starts with an
//! affected path prefix.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Result;

type SharedCompute<T> = Shared<BoxFuture<'static, Result<T>>>;

enum Entry<T> {
    /// A computation is in flight; later callers join it instead of
    /// starting their own.
    Pending {
        generation: u64,
        future: SharedCompute<T>,
    },
    /// A resolved value, valid until `expires_at`.
    Ready { value: T, expires_at: Instant },
}

enum Lookup<T> {
    Hit(T),
    Join(SharedCompute<T>, u64),
    Miss,
}

struct CacheState<T> {
    entries: HashMap<String, Entry<T>>,
    /// Distinguishes pending entries across invalidations, so a
    /// computation whose entry was removed mid-flight cannot publish
    /// a stale result under the same key.
    next_generation: u64,
}

/// Response cache keyed by string, generic over the cached value type.
pub struct ResponseCache<T> {
    ttl: Duration,
    state: Mutex<CacheState<T>>,
}

impl<T: Clone + Send + 'static> ResponseCache<T> {
    /// Create an empty cache whose entries live for `ttl` after resolving.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            }),
        }
    }

    /// The configured TTL of cache entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, computing it if absent.
    ///
    /// If an unexpired entry exists its value is returned; a still-pending
    /// entry is awaited, so any number of concurrent callers trigger at
    /// most one invocation of `compute` per key. On success the resolved
    /// value is kept until the TTL elapses. A failed computation is never
    /// cached: the entry is removed and the error propagates to every
    /// caller that joined it.
    pub async fn get<F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (future, generation) = {
            let mut state = self.state.lock().await;
            let lookup = match state.entries.get(key) {
                Some(Entry::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    Lookup::Hit(value.clone())
                }
                Some(Entry::Pending { future, generation }) => {
                    Lookup::Join(future.clone(), *generation)
                }
                // Absent, or expired and dropped by the insert below.
                _ => Lookup::Miss,
            };
            match lookup {
                Lookup::Hit(value) => {
                    trace!(key, "cache hit");
                    return Ok(value);
                }
                Lookup::Join(future, generation) => {
                    trace!(key, "joining in-flight computation");
                    (future, generation)
                }
                Lookup::Miss => {
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let future: SharedCompute<T> = compute().boxed().shared();
                    state.entries.insert(
                        key.to_string(),
                        Entry::Pending {
                            generation,
                            future: future.clone(),
                        },
                    );
                    debug!(key, "cache miss, computing");
                    (future, generation)
                }
            }
        };

        let result = future.await;
        self.publish(key, generation, &result).await;
        result
    }

    /// Convert the pending entry into its terminal state. Every caller
    /// sharing the computation attempts this; the first one wins and the
    /// rest see a generation mismatch.
    async fn publish(&self, key: &str, generation: u64, result: &Result<T>) {
        let mut state = self.state.lock().await;
        let still_pending = matches!(
            state.entries.get(key),
            Some(Entry::Pending { generation: g, .. }) if *g == generation
        );
        if !still_pending {
            return;
        }
        match result {
            Ok(value) => {
                state.entries.insert(
                    key.to_string(),
                    Entry::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            Err(_) => {
                // A failed lookup must not be cached.
                state.entries.remove(key);
            }
        }
    }

    /// Remove every entry whose key starts with any of the given prefixes,
    /// compared case-insensitively.
    ///
    /// Once this returns, no later `get` observes a removed entry. Callers
    /// already sharing a pending computation are unaffected.
    pub async fn invalidate<I, S>(&self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .collect();
        if prefixes.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|key, _| {
            let key = key.to_lowercase();
            !prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
        });
        debug!(
            removed = before - state.entries.len(),
            ?prefixes,
            "invalidated cache entries"
        );
    }

    /// Unconditionally drop all entries.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        debug!("cache reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn counting_compute(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32>> + Send + 'static {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = Arc::new(ResponseCache::<u32>::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get("key", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(7u32)
                    })
                    .await
            }));
        }

        // Let every caller reach the pending entry before releasing it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let ttl = Duration::from_secs(30);
        let cache = ResponseCache::<u32>::new(ttl);
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.get("k", || counting_compute(&calls, 1)).await.unwrap(), 1);
        assert_eq!(cache.get("k", || counting_compute(&calls, 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(ttl + Duration::from_millis(1)).await;

        assert_eq!(cache.get("k", || counting_compute(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(60));

        let err = cache
            .get("k", || async { Err::<u32, _>(PanError::api(31080)) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(31080));

        // The failed entry is gone; a succeeding compute runs fresh.
        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(cache.get("k", || counting_compute(&calls, 9)).await.unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_fans_out_to_all_waiters() {
        let cache = Arc::new(ResponseCache::<u32>::new(Duration::from_secs(60)));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get("k", move || async move {
                        gate.notified().await;
                        Err::<u32, _>(PanError::api(2))
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err().code(), Some(2));
        }
    }

    #[tokio::test]
    async fn test_prefix_invalidation_exactness() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("/a$list", || counting_compute(&calls, 1)).await.unwrap();
        cache.get("/a/b$info", || counting_compute(&calls, 2)).await.unwrap();
        cache.get("/c$list", || counting_compute(&calls, 3)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // "/a$" matches only "/a$list", not "/a/b$info".
        cache.invalidate(["/a$"]).await;
        assert_eq!(cache.get("/a$list", || counting_compute(&calls, 4)).await.unwrap(), 4);
        assert_eq!(cache.get("/a/b$info", || counting_compute(&calls, 5)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        cache.invalidate(["/a/b"]).await;
        assert_eq!(cache.get("/a/b$info", || counting_compute(&calls, 6)).await.unwrap(), 6);

        // "/c$list" survives both invalidations.
        assert_eq!(cache.get("/c$list", || counting_compute(&calls, 7)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_invalidation_is_case_insensitive() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("/Docs$list", || counting_compute(&calls, 1)).await.unwrap();
        cache.invalidate(["/docs$"]).await;
        assert_eq!(cache.get("/Docs$list", || counting_compute(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_drops_everything() {
        let cache = ResponseCache::<u32>::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("a", || counting_compute(&calls, 1)).await.unwrap();
        cache.get("b", || counting_compute(&calls, 2)).await.unwrap();
        cache.reset().await;

        cache.get("a", || counting_compute(&calls, 3)).await.unwrap();
        cache.get("b", || counting_compute(&calls, 4)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_invalidation_during_flight_is_not_resurrected() {
        let cache = Arc::new(ResponseCache::<u32>::new(Duration::from_secs(60)));
        let gate = Arc::new(Notify::new());

        let waiter = {
            let cache = cache.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                cache
                    .get("k", move || async move {
                        gate.notified().await;
                        Ok(1u32)
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.invalidate(["k"]).await;
        gate.notify_waiters();

        // The joined caller still observes the result it was waiting for.
        assert_eq!(waiter.await.unwrap().unwrap(), 1);

        // But the invalidated entry was not re-published.
        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(cache.get("k", || counting_compute(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
