//! Typed remote data loader
//!
//! Caches one value per key with a freshness window. Concurrent non-forced
//! loads of a key share a single fetch; every fetch is tagged with a
//! generation and only the latest generation may publish its result.
//!
//! Slot state lives behind a std mutex that is never held across an await.
//! Completion is announced on a per-key `watch` channel.

use chrono::{DateTime, Local, TimeDelta};
use petlog_api::{ApiError, ApiResult, CredentialRefresher};
use petlog_util::Clock;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default freshness window
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Serve a fresh cached value, or join a fetch already in flight
    UseCache,
    /// Always fetch, superseding any fetch in flight
    ForceRefresh,
}

/// Cached remote value with its loading state
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub value: Option<T>,
    pub fetched_at: Option<DateTime<Local>>,
    pub ttl: Duration,
    pub is_loading: bool,
    pub last_error: Option<ApiError>,
}

impl<T> CachedValue<T> {
    pub fn empty(ttl: Duration) -> Self {
        Self {
            value: None,
            fetched_at: None,
            ttl,
            is_loading: false,
            last_error: None,
        }
    }

    /// Present value fetched less than `ttl` ago
    pub fn is_fresh(&self, now: DateTime<Local>) -> bool {
        let (Some(_), Some(fetched_at)) = (&self.value, self.fetched_at) else {
            return false;
        };
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(fetched_at) < ttl
    }

    /// The server answered, but there is nothing to show yet
    pub fn is_empty_state(&self) -> bool {
        self.value.is_none() && self.fetched_at.is_some() && self.last_error.is_none()
    }
}

struct Slot<T> {
    cached: CachedValue<T>,
    /// Last generation handed out; never reused
    issued: u64,
    /// Generation allowed to publish its result
    generation: u64,
    /// Generations whose fetch has started and not yet finished
    in_flight: BTreeSet<u64>,
    /// Publishes the generation of each finished fetch
    done: watch::Sender<u64>,
}

impl<T> Slot<T> {
    fn new(ttl: Duration) -> Self {
        let (done, _) = watch::channel(0);
        Self {
            cached: CachedValue::empty(ttl),
            issued: 0,
            generation: 0,
            in_flight: BTreeSet::new(),
            done,
        }
    }
}

enum Start<T> {
    Cached(CachedValue<T>),
    Join(watch::Receiver<u64>),
    Fetch(u64),
}

enum Finish<T> {
    Applied(CachedValue<T>),
    Superseded(watch::Receiver<u64>),
}

/// Keyed loader with TTL caching, single-flight fetches and a
/// refresh-then-retry-once policy for rejected credentials
pub struct Loader<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
    clock: Arc<dyn Clock>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    ttl: Duration,
}

impl<K, T> Loader<K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            refresher: None,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Used once when a fetch reports `Unauthorized`
    pub fn with_refresher(mut self, refresher: Arc<dyn CredentialRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<T>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the value for `key`, fetching when the policy requires it.
    ///
    /// `fetcher` may be called twice when the first call is rejected as
    /// unauthorized and the credentials were refreshed.
    pub async fn load<F, Fut>(&self, key: K, policy: LoadPolicy, fetcher: F) -> CachedValue<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let start = {
            let mut slots = self.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(self.ttl));

            if policy == LoadPolicy::UseCache && slot.cached.is_fresh(self.clock.now()) {
                Start::Cached(slot.cached.clone())
            } else if policy == LoadPolicy::UseCache && slot.cached.is_loading {
                Start::Join(slot.done.subscribe())
            } else {
                slot.issued += 1;
                slot.generation = slot.issued;
                slot.in_flight.insert(slot.generation);
                slot.cached.is_loading = true;
                slot.cached.last_error = None;
                Start::Fetch(slot.generation)
            }
        };

        let generation = match start {
            Start::Cached(cached) => {
                debug!(key = ?key, "Cache hit");
                return cached;
            }
            Start::Join(rx) => {
                debug!(key = ?key, "Joining fetch in flight");
                return self.wait_idle(&key, rx).await;
            }
            Start::Fetch(generation) => generation,
        };

        debug!(key = ?key, generation, ?policy, "Fetching");
        let mut guard = InFlight {
            loader: self,
            key: &key,
            generation,
            armed: true,
        };
        let result = self.fetch_with_retry(&fetcher).await;
        guard.armed = false;

        match self.finish(&key, generation, result) {
            Finish::Applied(cached) => cached,
            Finish::Superseded(rx) => self.wait_idle(&key, rx).await,
        }
    }

    async fn fetch_with_retry<F, Fut>(&self, fetcher: &F) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let err = match fetcher().await {
            Err(err) if err.is_unauthorized() => err,
            other => return other,
        };

        let Some(refresher) = &self.refresher else {
            return Err(err);
        };

        info!(error = %err, "Credentials rejected, refreshing once");
        if let Err(refresh_err) = refresher.refresh_credentials().await {
            warn!(error = %refresh_err, "Credential refresh failed");
            return Err(match refresh_err {
                ApiError::Unauthorized(msg) => ApiError::Unauthorized(msg),
                other => ApiError::unauthorized(format!("credential refresh failed: {}", other)),
            });
        }

        let retried = fetcher().await;
        if let Err(err) = &retried
            && err.is_unauthorized()
        {
            warn!(error = %err, "Still unauthorized after refresh");
        }
        retried
    }

    fn finish(&self, key: &K, generation: u64, result: ApiResult<T>) -> Finish<T> {
        let now = self.clock.now();
        let mut slots = self.lock();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(self.ttl));
        slot.in_flight.remove(&generation);

        if slot.generation != generation {
            debug!(key = ?key, generation, latest = slot.generation, "Discarding superseded result");
            return if slot.cached.is_loading {
                Finish::Superseded(slot.done.subscribe())
            } else {
                Finish::Applied(slot.cached.clone())
            };
        }

        let cached = &mut slot.cached;
        match result {
            Ok(value) => {
                cached.value = Some(value);
                cached.fetched_at = Some(now);
                cached.last_error = None;
            }
            Err(err) if err.is_not_found() => {
                debug!(key = ?key, "Nothing on the server yet");
                cached.value = None;
                cached.fetched_at = Some(now);
                cached.last_error = None;
            }
            Err(err) => {
                warn!(key = ?key, error = %err, "Fetch failed, keeping last value");
                cached.last_error = Some(err);
            }
        }
        cached.is_loading = false;

        slot.done.send_replace(generation);
        Finish::Applied(slot.cached.clone())
    }

    /// Wait until no fetch for `key` is in flight and return the result.
    async fn wait_idle(&self, key: &K, mut rx: watch::Receiver<u64>) -> CachedValue<T> {
        loop {
            {
                let slots = self.lock();
                match slots.get(key) {
                    Some(slot) if slot.cached.is_loading => {}
                    Some(slot) => return slot.cached.clone(),
                    None => return CachedValue::empty(self.ttl),
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot(key);
            }
        }
    }

    /// Current state for `key` without fetching
    pub fn snapshot(&self, key: &K) -> CachedValue<T> {
        self.lock()
            .get(key)
            .map(|slot| slot.cached.clone())
            .unwrap_or_else(|| CachedValue::empty(self.ttl))
    }

    /// Mark the value stale so the next load fetches; the value stays visible
    pub fn invalidate(&self, key: &K) {
        if let Some(slot) = self.lock().get_mut(key) {
            slot.cached.fetched_at = None;
        }
    }

    /// Edit a present value in place (optimistic update). Returns whether a value was edited.
    pub fn update_cached(&self, key: &K, edit: impl FnOnce(&mut T)) -> bool {
        let mut slots = self.lock();
        match slots.get_mut(key).and_then(|slot| slot.cached.value.as_mut()) {
            Some(value) => {
                edit(value);
                true
            }
            None => false,
        }
    }

    /// Forget a fetch whose future was dropped. When it was the current
    /// generation, the newest older fetch still running takes its place.
    fn abandon(&self, key: &K, generation: u64) {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        slot.in_flight.remove(&generation);
        if slot.generation != generation || !slot.cached.is_loading {
            return;
        }

        match slot.in_flight.last().copied() {
            Some(older) => {
                debug!(key = ?key, generation, older, "Fetch dropped, older fetch takes over");
                slot.generation = older;
            }
            None => {
                debug!(key = ?key, generation, "Fetch dropped before completion");
                slot.cached.is_loading = false;
                slot.done.send_replace(generation);
            }
        }
    }
}

/// Releases the in-flight state if the loading future is dropped mid-fetch
struct InFlight<'a, K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    loader: &'a Loader<K, T>,
    key: &'a K,
    generation: u64,
    armed: bool,
}

impl<K, T> Drop for InFlight<'_, K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    fn drop(&mut self) {
        if self.armed {
            self.loader.abandon(self.key, self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use petlog_util::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2025, 10, 31, 9, 0, 0).unwrap(),
        ))
    }

    fn loader(clock: &Arc<ManualClock>) -> Loader<&'static str, u32> {
        Loader::new(clock.clone())
    }

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CredentialRefresher for CountingRefresher {
        async fn refresh_credentials(&self) -> ApiResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ApiError::unauthorized("refresh token expired"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn cache_hit_within_ttl() {
        let clock = clock();
        let loader = loader(&clock);
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(7)
        };

        let first = loader.load("home", LoadPolicy::UseCache, fetch).await;
        clock.advance(Duration::from_secs(59));
        let second = loader.load("home", LoadPolicy::UseCache, fetch).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.value, Some(7));
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn expired_value_is_refetched() {
        let clock = clock();
        let loader = loader(&clock);
        let calls = AtomicUsize::new(0);
        let fetch = || async { Ok::<_, ApiError>(calls.fetch_add(1, Ordering::SeqCst) as u32) };

        loader.load("home", LoadPolicy::UseCache, fetch).await;
        clock.advance(DEFAULT_TTL);
        let cached = loader.load("home", LoadPolicy::UseCache, fetch).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.value, Some(1));
        assert_eq!(cached.fetched_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn force_refresh_bypasses_ttl() {
        let clock = clock();
        let loader = loader(&clock);
        let calls = AtomicUsize::new(0);
        let fetch = || async { Ok::<_, ApiError>(calls.fetch_add(1, Ordering::SeqCst) as u32) };

        loader.load("home", LoadPolicy::UseCache, fetch).await;
        let cached = loader.load("home", LoadPolicy::ForceRefresh, fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.value, Some(1));
    }

    #[tokio::test]
    async fn failure_keeps_last_value() {
        let clock = clock();
        let loader = loader(&clock);

        loader.load("home", LoadPolicy::UseCache, || async { Ok(1) }).await;
        let cached = loader
            .load("home", LoadPolicy::ForceRefresh, || async {
                Err(ApiError::network("offline"))
            })
            .await;

        assert_eq!(cached.value, Some(1));
        assert!(!cached.is_loading);
        assert_eq!(cached.last_error, Some(ApiError::network("offline")));

        // The next successful fetch clears the error
        let cached = loader
            .load("home", LoadPolicy::ForceRefresh, || async { Ok(2) })
            .await;
        assert_eq!(cached.value, Some(2));
        assert_eq!(cached.last_error, None);
    }

    #[tokio::test]
    async fn not_found_is_an_empty_state() {
        let clock = clock();
        let loader = loader(&clock);

        loader.load("home", LoadPolicy::UseCache, || async { Ok(1) }).await;
        let cached = loader
            .load("home", LoadPolicy::ForceRefresh, || async {
                Err(ApiError::not_found("no group"))
            })
            .await;

        assert_eq!(cached.value, None);
        assert_eq!(cached.last_error, None);
        assert!(cached.is_empty_state());
    }

    #[tokio::test]
    async fn unauthorized_refreshes_and_retries_once() {
        let clock = clock();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let loader = loader(&clock).with_refresher(refresher.clone());
        let calls = AtomicUsize::new(0);

        let cached = loader
            .load("home", LoadPolicy::UseCache, || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::unauthorized("expired"))
                } else {
                    Ok(5)
                }
            })
            .await;

        assert_eq!(cached.value, Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_is_terminal() {
        let clock = clock();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let loader = loader(&clock).with_refresher(refresher.clone());
        let calls = AtomicUsize::new(0);

        let cached = loader
            .load("home", LoadPolicy::UseCache, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(ApiError::unauthorized("expired"))
            })
            .await;

        assert!(cached.last_error.as_ref().is_some_and(ApiError::is_unauthorized));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_skips_the_retry() {
        let clock = clock();
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let loader = loader(&clock).with_refresher(refresher.clone());
        let calls = AtomicUsize::new(0);

        let cached = loader
            .load("home", LoadPolicy::UseCache, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(ApiError::unauthorized("expired"))
            })
            .await;

        assert!(cached.last_error.as_ref().is_some_and(ApiError::is_unauthorized));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let clock = clock();
        let loader = loader(&clock);
        let gate = Semaphore::new(0);
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            gate.acquire().await.unwrap().forget();
            Ok::<_, ApiError>(9)
        };

        let release = async {
            tokio::task::yield_now().await;
            assert!(loader.snapshot(&"home").is_loading);
            gate.add_permits(1);
        };
        let (a, b, ()) = tokio::join!(
            loader.load("home", LoadPolicy::UseCache, fetch),
            loader.load("home", LoadPolicy::UseCache, fetch),
            release
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.value, Some(9));
        assert_eq!(b.value, Some(9));
    }

    #[tokio::test]
    async fn superseded_generation_is_discarded() {
        let clock = clock();
        let loader = loader(&clock);
        let slow_gate = Semaphore::new(0);

        let slow = loader.load("home", LoadPolicy::UseCache, || async {
            slow_gate.acquire().await.unwrap().forget();
            Ok(1)
        });
        let newer = async {
            tokio::task::yield_now().await;
            let cached = loader
                .load("home", LoadPolicy::ForceRefresh, || async { Ok(2) })
                .await;
            slow_gate.add_permits(1);
            cached
        };

        let (old, new) = tokio::join!(slow, newer);
        assert_eq!(new.value, Some(2));
        // The older completion arrived last but did not overwrite
        assert_eq!(old.value, Some(2));
        assert_eq!(loader.snapshot(&"home").value, Some(2));
    }

    #[tokio::test]
    async fn dropped_fetch_releases_waiters() {
        let clock = clock();
        let loader = loader(&clock);
        let never = Semaphore::new(0);

        let stuck = loader.load("home", LoadPolicy::UseCache, || async {
            never.acquire().await.unwrap().forget();
            Ok(1)
        });
        // Poll the stuck load once, then drop it
        let _ = tokio::time::timeout(Duration::from_millis(10), stuck).await;
        assert!(!loader.snapshot(&"home").is_loading);

        let cached = loader
            .load("home", LoadPolicy::UseCache, || async { Ok(3) })
            .await;
        assert_eq!(cached.value, Some(3));
    }

    #[tokio::test]
    async fn dropped_forced_refresh_hands_back_to_running_fetch() {
        let clock = clock();
        let loader = loader(&clock);
        let slow_gate = Semaphore::new(0);
        let never = Semaphore::new(0);
        let calls = AtomicUsize::new(0);

        let slow = loader.load("home", LoadPolicy::UseCache, || async {
            slow_gate.acquire().await.unwrap().forget();
            Ok(1)
        });
        let follower = async {
            tokio::task::yield_now().await;
            let forced = loader.load("home", LoadPolicy::ForceRefresh, || async {
                never.acquire().await.unwrap().forget();
                Ok(2)
            });
            let _ = tokio::time::timeout(Duration::from_millis(10), forced).await;
            assert!(loader.snapshot(&"home").is_loading);

            slow_gate.add_permits(1);
            loader
                .load("home", LoadPolicy::UseCache, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(3)
                })
                .await
        };

        let (first, joined) = tokio::join!(slow, follower);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(first.value, Some(1));
        assert_eq!(joined.value, Some(1));
        assert!(!loader.snapshot(&"home").is_loading);
    }

    #[tokio::test]
    async fn invalidate_and_optimistic_update() {
        let clock = clock();
        let loader = loader(&clock);
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(10)
        };

        assert!(!loader.update_cached(&"home", |v| *v += 1));
        loader.load("home", LoadPolicy::UseCache, fetch).await;
        assert!(loader.update_cached(&"home", |v| *v += 1));
        assert_eq!(loader.snapshot(&"home").value, Some(11));

        loader.invalidate(&"home");
        assert_eq!(loader.snapshot(&"home").value, Some(11));
        loader.load("home", LoadPolicy::UseCache, fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let clock = clock();
        let loader = loader(&clock);
        loader.load("a", LoadPolicy::UseCache, || async { Ok(1) }).await;
        let b = loader.load("b", LoadPolicy::UseCache, || async { Ok(2) }).await;
        assert_eq!(b.value, Some(2));
        assert_eq!(loader.snapshot(&"a").value, Some(1));
        assert_eq!(loader.snapshot(&"c").value, None);
    }
}
