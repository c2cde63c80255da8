//! Deduplicated, cached sidekick state store

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::backend::SidekickBackend;
use crate::state::{SidekickKey, SidekickState};
use crate::Result;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

type LoadFuture = Shared<BoxFuture<'static, Result<Option<SidekickState>>>>;

struct InFlight {
    id: u64,
    future: LoadFuture,
}

struct CacheEntry {
    state: Option<SidekickState>,
    stored_at: Instant,
}

#[derive(Default)]
struct Slots {
    in_flight: HashMap<SidekickKey, InFlight>,
    cache: HashMap<SidekickKey, CacheEntry>,
}

impl Slots {
    /// Drop expired entries, then look up `key`
    fn fresh(&mut self, key: &SidekickKey, ttl: Duration) -> Option<&CacheEntry> {
        self.cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        self.cache.get(key)
    }
}

/// Sidekick state store.
///
/// A load that started before a save never writes its result: completion
/// only touches the cache while its own in-flight slot is still current.
#[derive(Clone)]
pub struct SidekickStore {
    backend: Arc<dyn SidekickBackend>,
    ttl: Duration,
    slots: Arc<Mutex<Slots>>,
    next_id: Arc<AtomicU64>,
}

impl SidekickStore {
    pub fn new(backend: Arc<dyn SidekickBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            slots: Arc::new(Mutex::new(Slots::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired cached state, without touching the backend
    pub fn cached(&self, key: &SidekickKey) -> Option<SidekickState> {
        self.slots
            .lock()
            .fresh(key, self.ttl)
            .and_then(|entry| entry.state.clone())
    }

    /// Number of cache entries held, expired ones included until the next read
    pub fn cache_len(&self) -> usize {
        self.slots.lock().cache.len()
    }

    /// Whether a load for `key` is outstanding
    pub fn is_loading(&self, key: &SidekickKey) -> bool {
        self.slots.lock().in_flight.contains_key(key)
    }

    /// Load the state for `key`.
    ///
    /// Served from cache when fresh; otherwise joins the outstanding load
    /// for the same key, or starts one.
    pub async fn load(&self, key: &SidekickKey) -> Result<Option<SidekickState>> {
        let future = {
            let mut slots = self.slots.lock();

            if let Some(entry) = slots.fresh(key, self.ttl) {
                return Ok(entry.state.clone());
            }

            match slots.in_flight.get(key) {
                Some(in_flight) => {
                    tracing::debug!(key = %key, "Joining in-flight sidekick load");
                    in_flight.future.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.start_load(key.clone(), id);
                    slots.in_flight.insert(
                        key.clone(),
                        InFlight {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        future.await
    }

    fn start_load(&self, key: SidekickKey, id: u64) -> LoadFuture {
        let backend = Arc::clone(&self.backend);
        let slots = Arc::clone(&self.slots);

        async move {
            let result = backend.load(&key).await;

            let mut slots = slots.lock();
            let current = slots.in_flight.get(&key).is_some_and(|f| f.id == id);
            if current {
                slots.in_flight.remove(&key);
                if let Ok(state) = &result {
                    slots.cache.insert(
                        key.clone(),
                        CacheEntry {
                            state: state.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
            } else {
                tracing::debug!(key = %key, "Discarding superseded sidekick load");
            }

            if let Err(e) = &result {
                tracing::warn!(key = %key, error = %e, "Failed to load sidekick state");
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Persist `state` and make it visible to readers immediately.
    ///
    /// Any load in flight for `key` is detached so it cannot overwrite the
    /// saved value.
    pub async fn save(&self, key: SidekickKey, state: SidekickState) -> Result<()> {
        self.slots.lock().in_flight.remove(&key);

        self.backend.save(&key, &state).await?;

        let mut slots = self.slots.lock();
        slots.in_flight.remove(&key);
        slots.cache.insert(
            key.clone(),
            CacheEntry {
                state: Some(state),
                stored_at: Instant::now(),
            },
        );

        tracing::info!(key = %key, "Saved sidekick state");
        Ok(())
    }

    /// Drop cached and in-flight state for `key`
    pub fn invalidate(&self, key: &SidekickKey) {
        let mut slots = self.slots.lock();
        slots.in_flight.remove(key);
        slots.cache.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SidekickError;
    use async_trait::async_trait;
    use portico_dispatch::StatusCode;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Backend whose loads take `delay` and return the last saved value
    struct SlowBackend {
        delay: Duration,
        stored: Mutex<Option<SidekickState>>,
        loads: AtomicUsize,
        saves: AtomicUsize,
        fail: bool,
    }

    impl SlowBackend {
        fn new(delay: Duration, stored: Option<SidekickState>) -> Self {
            Self {
                delay,
                stored: Mutex::new(stored),
                loads: AtomicUsize::new(0),
                saves: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SidekickBackend for SlowBackend {
        async fn load(&self, _key: &SidekickKey) -> Result<Option<SidekickState>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let snapshot = self.stored.lock().clone();
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(SidekickError::Upstream(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(snapshot)
        }

        async fn save(&self, _key: &SidekickKey, state: &SidekickState) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.stored.lock() = Some(state.clone());
            Ok(())
        }
    }

    fn state(v: serde_json::Value) -> SidekickState {
        SidekickState::new(v)
    }

    fn key() -> SidekickKey {
        SidekickKey::new("chat-1", "model-a")
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_call() {
        let backend = Arc::new(SlowBackend::new(
            Duration::from_millis(100),
            Some(state(json!({"open": true}))),
        ));
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);
        let k = key();

        let (a, b) = tokio::join!(store.load(&k), store.load(&k));

        assert_eq!(a, b);
        assert_eq!(a.unwrap(), Some(state(json!({"open": true}))));
        assert_eq!(backend.loads(), 1);
        assert!(!store.is_loading(&k));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_load_separately() {
        let backend = Arc::new(SlowBackend::new(Duration::from_millis(10), None));
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);

        let first = key();
        let other = SidekickKey::new("chat-1", "model-b");
        let (a, b) = tokio::join!(store.load(&first), store.load(&other));

        assert_eq!(a, Ok(None));
        assert_eq!(b, Ok(None));
        assert_eq!(backend.loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_until_expiry() {
        let backend = Arc::new(SlowBackend::new(
            Duration::from_millis(10),
            Some(state(json!(1))),
        ));
        let store = SidekickStore::new(backend.clone(), Duration::from_secs(5));
        let k = key();

        assert_eq!(store.cached(&k), None);
        store.load(&k).await.unwrap();
        assert_eq!(store.cached(&k), Some(state(json!(1))));

        store.load(&k).await.unwrap();
        assert_eq!(backend.loads(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.cached(&k), None);
        store.load(&k).await.unwrap();
        assert_eq!(backend.loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_dropped() {
        let backend = Arc::new(SlowBackend::new(Duration::from_millis(10), Some(state(json!(1)))));
        let store = SidekickStore::new(backend.clone(), Duration::from_secs(5));

        let first = key();
        let second = SidekickKey::new("chat-2", "model-a");
        store.load(&first).await.unwrap();
        store.load(&second).await.unwrap();
        assert_eq!(store.cache_len(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.cached(&first), None);
        assert_eq!(store.cache_len(), 0);

        store.load(&second).await.unwrap();
        assert_eq!(store.cache_len(), 1);
        assert_eq!(backend.loads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_visible_without_backend_load() {
        let backend = Arc::new(SlowBackend::new(Duration::from_millis(10), None));
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);
        let k = key();

        store.save(k.clone(), state(json!({"tab": "notes"}))).await.unwrap();

        assert_eq!(store.cached(&k), Some(state(json!({"tab": "notes"}))));
        assert_eq!(store.load(&k).await, Ok(Some(state(json!({"tab": "notes"})))));
        assert_eq!(backend.loads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_load_does_not_overwrite_save() {
        let backend = Arc::new(SlowBackend::new(
            Duration::from_secs(1),
            Some(state(json!("old"))),
        ));
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);
        let k = key();

        let loader = {
            let store = store.clone();
            let k = k.clone();
            tokio::spawn(async move { store.load(&k).await })
        };
        tokio::task::yield_now().await;
        assert!(store.is_loading(&k));

        store.save(k.clone(), state(json!("new"))).await.unwrap();

        // The detached load still answers its own caller
        assert_eq!(loader.await.unwrap(), Ok(Some(state(json!("old")))));
        assert_eq!(store.cached(&k), Some(state(json!("new"))));
        assert_eq!(store.load(&k).await, Ok(Some(state(json!("new")))));
        assert_eq!(backend.loads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_not_cached() {
        let mut backend = SlowBackend::new(Duration::from_millis(10), None);
        backend.fail = true;
        let backend = Arc::new(backend);
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);
        let k = key();

        let (a, b) = tokio::join!(store.load(&k), store.load(&k));
        assert_eq!(a, Err(SidekickError::Upstream(StatusCode::SERVICE_UNAVAILABLE)));
        assert_eq!(a, b);
        assert_eq!(backend.loads(), 1);

        assert!(!store.is_loading(&k));
        assert!(store.load(&k).await.is_err());
        assert_eq!(backend.loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_reload() {
        let backend = Arc::new(SlowBackend::new(Duration::from_millis(10), Some(state(json!(1)))));
        let store = SidekickStore::new(backend.clone(), DEFAULT_CACHE_TTL);
        let k = key();

        store.load(&k).await.unwrap();
        store.invalidate(&k);
        assert_eq!(store.cached(&k), None);

        store.load(&k).await.unwrap();
        assert_eq!(backend.loads(), 2);
    }
}
