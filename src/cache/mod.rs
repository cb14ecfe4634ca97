//! Query cache
//!
//! Holds fetched entities keyed by resource and filter. Reads for the same
//! key are deduplicated, cached data is served while a refresh is pending,
//! and invalidation (explicit, realtime or polling) forces the next read to
//! fetch again. Cached values are only ever replaced by a whole server
//! response; nothing edits them in place.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// =============================================================================
// Keys
// =============================================================================

/// Resource families. Invalidating a resource invalidates every key in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Dashboard,
    Leads,
    Lead,
    Conversations,
    Conversation,
    Calls,
    Appointments,
    Reports,
    Settings,
    Services,
    CalendarIntegrations,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Leads => "leads",
            Self::Lead => "lead",
            Self::Conversations => "conversations",
            Self::Conversation => "conversation",
            Self::Calls => "calls",
            Self::Appointments => "appointments",
            Self::Reports => "reports",
            Self::Settings => "settings",
            Self::Services => "services",
            Self::CalendarIntegrations => "calendar_integrations",
        }
    }
}

/// Resource plus an optional scope (record id or filter)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub resource: Resource,
    pub scope: Option<String>,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            scope: None,
        }
    }

    pub fn scoped(resource: Resource, scope: impl fmt::Display) -> Self {
        Self {
            resource,
            scope: Some(scope.to_string()),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(ref scope) => write!(f, "{}/{}", self.resource.as_str(), scope),
            None => f.write_str(self.resource.as_str()),
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// A cached value with its freshness
#[derive(Debug)]
pub struct Cached<T> {
    pub data: Arc<T>,
    /// True when the value has been invalidated and a refetch is due
    pub is_stale: bool,
    pub fetched_at: Instant,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            is_stale: self.is_stale,
            fetched_at: self.fetched_at,
        }
    }
}

struct Entry {
    value: Option<Arc<dyn Any + Send + Sync>>,
    fetched_at: Option<Instant>,
    stale: bool,
    /// Bumped on every invalidation; a fetch that started under an older
    /// epoch stores its result as already stale.
    epoch: u64,
    /// Held for the duration of a fetch so concurrent readers share it
    flight: Arc<tokio::sync::Mutex<()>>,
    error: Option<String>,
}

impl Entry {
    fn new() -> Self {
        Self {
            value: None,
            fetched_at: None,
            stale: true,
            epoch: 0,
            flight: Arc::new(tokio::sync::Mutex::new(())),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which a value counts as stale even without invalidation.
    /// `None` keeps values fresh until invalidated.
    pub stale_after: Option<Duration>,
    /// Capacity of the invalidation broadcast
    pub channel_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: None,
            channel_capacity: 256,
        }
    }
}

/// Shared query cache. Clones refer to the same store.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
    invalidations: broadcast::Sender<QueryKey>,
    config: CacheConfig,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.lock().len())
            .field("config", &self.config)
            .finish()
    }
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let (invalidations, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            invalidations,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, fetched_at: Instant) -> bool {
        self.config
            .stale_after
            .is_some_and(|max_age| fetched_at.elapsed() >= max_age)
    }

    fn snapshot<T: Send + Sync + 'static>(&self, entry: &Entry) -> Option<Cached<T>> {
        let value = entry.value.as_ref()?;
        let fetched_at = entry.fetched_at?;
        let data = Arc::clone(value).downcast::<T>().ok()?;
        Some(Cached {
            data,
            is_stale: entry.stale || self.is_expired(fetched_at),
            fetched_at,
        })
    }

    /// Cached value for a key, fresh or stale, without fetching
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Cached<T>> {
        let entries = self.lock();
        entries.get(key).and_then(|entry| self.snapshot(entry))
    }

    /// Error message from the most recent failed fetch of a key, cleared by
    /// the next successful one
    pub fn error(&self, key: &QueryKey) -> Option<String> {
        self.lock().get(key).and_then(|entry| entry.error.clone())
    }

    /// Return the fresh cached value for `key`, or run `fetcher` to get one.
    ///
    /// Concurrent calls for the same key share a single fetch. On failure the
    /// previous value (if any) is kept and the error is recorded for the key.
    pub async fn fetch<T, E, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Cached<T>, E>
    where
        T: Send + Sync + 'static,
        E: fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let flight = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            if let Some(cached) = self.snapshot::<T>(entry) {
                if !cached.is_stale {
                    return Ok(cached);
                }
            }
            Arc::clone(&entry.flight)
        };

        let _in_flight = flight.lock().await;

        // Another reader may have completed the fetch while we waited
        let epoch = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            if let Some(cached) = self.snapshot::<T>(entry) {
                if !cached.is_stale {
                    return Ok(cached);
                }
            }
            entry.epoch
        };

        tracing::debug!("Fetching {}", key);
        let result = fetcher().await;

        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        match result {
            Ok(value) => {
                let data = Arc::new(value);
                let now = Instant::now();
                let superseded = entry.epoch != epoch;
                entry.value = Some(data.clone() as Arc<dyn Any + Send + Sync>);
                entry.fetched_at = Some(now);
                entry.stale = superseded;
                entry.error = None;
                if superseded {
                    tracing::debug!("{} was invalidated during fetch", key);
                }
                Ok(Cached {
                    data,
                    is_stale: superseded,
                    fetched_at: now,
                })
            }
            Err(e) => {
                tracing::warn!("Fetching {} failed: {}", key, e);
                entry.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Stale-while-revalidate read: a cached value is returned at once and,
    /// when stale, refreshed on a background task. Only an empty key waits
    /// for the fetch.
    pub async fn read<T, E, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Cached<T>, E>
    where
        T: Send + Sync + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.peek::<T>(&key) {
            Some(cached) => {
                if cached.is_stale {
                    let cache = self.clone();
                    tokio::spawn(async move {
                        let _ = cache.fetch(key, fetcher).await;
                    });
                }
                Ok(cached)
            }
            None => self.fetch(key, fetcher).await,
        }
    }

    /// Mark one key stale
    pub fn invalidate(&self, key: &QueryKey) {
        let found = {
            let mut entries = self.lock();
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.stale = true;
                    entry.epoch += 1;
                    true
                }
                None => false,
            }
        };
        if found {
            tracing::debug!("Invalidated {}", key);
            let _ = self.invalidations.send(key.clone());
        }
    }

    /// Mark every key of a resource stale. Returns the number of keys hit.
    pub fn invalidate_resource(&self, resource: Resource) -> usize {
        let keys: Vec<QueryKey> = {
            let mut entries = self.lock();
            let mut keys = Vec::new();
            for (key, entry) in entries.iter_mut() {
                if key.resource == resource {
                    entry.stale = true;
                    entry.epoch += 1;
                    keys.push(key.clone());
                }
            }
            keys
        };
        tracing::debug!(
            "Invalidated {} ({} keys)",
            resource.as_str(),
            keys.len()
        );
        let count = keys.len();
        for key in keys {
            let _ = self.invalidations.send(key);
        }
        count
    }

    /// Invalidate several resources at once
    pub fn invalidate_all(&self, resources: &[Resource]) {
        for resource in resources {
            self.invalidate_resource(*resource);
        }
    }

    /// Drop every entry (e.g. on sign-out)
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Receive every invalidated key
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidations.subscribe()
    }

    /// Invalidate `resources` every `interval` until the returned poller is
    /// dropped. The first invalidation happens one interval from now.
    pub fn poll(&self, resources: Vec<Resource>, interval: Duration) -> Poller {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                cache.invalidate_all(&resources);
            }
        });
        Poller { handle }
    }
}

/// Background polling task; stops when dropped
#[derive(Debug)]
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
