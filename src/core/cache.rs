//! Cache Adapter
//!
//! Uniform get/set/drop interface over a pluggable cache backend. Backends
//! store JSON values; the adapter does the typed (de)serialization and
//! decides whether the request context is passed through.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::BackendError;
use crate::types::RequestContext;

/// Cache backend interface (for dependency injection).
///
/// `request` is only supplied when the service is configured to pass the
/// request context to cache methods.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value. Expired and missing keys are both `None`.
    async fn get(
        &self,
        key: &str,
        request: Option<&RequestContext>,
    ) -> Result<Option<Value>, BackendError>;

    /// Set a value. `None` ttl means the backend's default lifetime.
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        request: Option<&RequestContext>,
    ) -> Result<(), BackendError>;

    /// Drop a value. Dropping a missing key succeeds.
    async fn drop(&self, key: &str, request: Option<&RequestContext>) -> Result<(), BackendError>;
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Minimum time between expiry sweeps made by [`InMemoryCache`] writes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn sweep(entries: &mut HashMap<String, CacheEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

/// In-process TTL map, the default backend.
///
/// Expired entries are evicted when read and by a sweep that runs on `set`
/// at most once per [`SWEEP_INTERVAL`].
pub struct InMemoryCache {
    segment: String,
    default_ttl: Option<Duration>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    next_sweep: Mutex<Instant>,
}

impl InMemoryCache {
    /// Create an in-memory cache whose entries live for `default_ttl` unless
    /// a set call names its own ttl.
    pub fn new(segment: impl Into<String>, default_ttl: Option<Duration>) -> Self {
        Self {
            segment: segment.into(),
            default_ttl,
            entries: Mutex::new(HashMap::new()),
            next_sweep: Mutex::new(Instant::now() + SWEEP_INTERVAL),
        }
    }

    /// Segment this cache namespaces its keys under.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were evicted.
    pub fn clear_expired(&self) -> usize {
        sweep(&mut self.entries.lock(), Instant::now())
    }

    fn segmented(&self, key: &str) -> String {
        format!("{}:{}", self.segment, key)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(
        &self,
        key: &str,
        _request: Option<&RequestContext>,
    ) -> Result<Option<Value>, BackendError> {
        let key = self.segmented(key);
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(&key).map_or(false, |entry| entry.is_expired(now)) {
            entries.remove(&key);
        }
        Ok(entries.get(&key).map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        _request: Option<&RequestContext>,
    ) -> Result<(), BackendError> {
        let now = Instant::now();
        let expires_at = ttl.or(self.default_ttl).map(|ttl| now + ttl);
        let mut entries = self.entries.lock();

        {
            let mut next_sweep = self.next_sweep.lock();
            if now >= *next_sweep {
                let evicted = sweep(&mut entries, now);
                *next_sweep = now + SWEEP_INTERVAL;
                if evicted > 0 {
                    debug!(segment = %self.segment, evicted, "Swept expired cache entries");
                }
            }
        }

        entries.insert(self.segmented(key), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn drop(&self, key: &str, _request: Option<&RequestContext>) -> Result<(), BackendError> {
        self.entries.lock().remove(&self.segmented(key));
        Ok(())
    }
}

/// A call recorded by [`MockCacheBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum CacheCall {
    Get { key: String, with_request: bool },
    Set {
        key: String,
        ttl: Option<Duration>,
        with_request: bool,
    },
    Drop { key: String, with_request: bool },
}

/// Mock cache backend for testing.
#[derive(Default)]
pub struct MockCacheBackend {
    entries: Mutex<HashMap<String, Value>>,
    history: Mutex<Vec<CacheCall>>,
    should_fail: Mutex<bool>,
}

impl MockCacheBackend {
    /// Create new mock cache backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `BackendError::Unavailable`.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock() = should_fail;
        self
    }

    /// Pre-populate an entry.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> &Self {
        self.entries.lock().insert(key.into(), value);
        self
    }

    /// Raw stored value.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Get call history.
    pub fn get_history(&self) -> Vec<CacheCall> {
        self.history.lock().clone()
    }

    fn check(&self) -> Result<(), BackendError> {
        if *self.should_fail.lock() {
            return Err(BackendError::Unavailable {
                message: "mock cache failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MockCacheBackend {
    async fn get(
        &self,
        key: &str,
        request: Option<&RequestContext>,
    ) -> Result<Option<Value>, BackendError> {
        self.history.lock().push(CacheCall::Get {
            key: key.to_string(),
            with_request: request.is_some(),
        });
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        request: Option<&RequestContext>,
    ) -> Result<(), BackendError> {
        self.history.lock().push(CacheCall::Set {
            key: key.to_string(),
            ttl,
            with_request: request.is_some(),
        });
        self.check()?;
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn drop(&self, key: &str, request: Option<&RequestContext>) -> Result<(), BackendError> {
        self.history.lock().push(CacheCall::Drop {
            key: key.to_string(),
            with_request: request.is_some(),
        });
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Typed access to a cache backend.
#[derive(Clone)]
pub struct CacheAdapter {
    backend: Arc<dyn CacheBackend>,
    pass_request: bool,
}

impl CacheAdapter {
    /// Wrap a backend. When `pass_request` is false the request context is
    /// never handed to the backend.
    pub fn new(backend: Arc<dyn CacheBackend>, pass_request: bool) -> Self {
        Self {
            backend,
            pass_request,
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    fn context<'a>(&self, request: Option<&'a RequestContext>) -> Option<&'a RequestContext> {
        if self.pass_request {
            request
        } else {
            None
        }
    }

    /// Get and deserialize a value.
    pub async fn get<T>(
        &self,
        key: &str,
        request: Option<&RequestContext>,
    ) -> Result<Option<T>, BackendError>
    where
        T: DeserializeOwned,
    {
        let value = self.backend.get(key, self.context(request)).await?;
        debug!(key, hit = value.is_some(), "Cache get");

        value
            .map(|value| {
                serde_json::from_value(value).map_err(|e| BackendError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Serialize and set a value.
    pub async fn set<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        request: Option<&RequestContext>,
    ) -> Result<(), BackendError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|e| BackendError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        debug!(key, "Cache set");
        self.backend.set(key, value, ttl, self.context(request)).await
    }

    /// Drop a value.
    pub async fn drop(&self, key: &str, request: Option<&RequestContext>) -> Result<(), BackendError> {
        debug!(key, "Cache drop");
        CacheBackend::drop(self.backend.as_ref(), key, self.context(request)).await
    }
}

/// Create the default in-memory cache.
pub fn create_cache(segment: &str, default_ttl: Duration) -> InMemoryCache {
    InMemoryCache::new(segment, Some(default_ttl))
}

/// Create mock cache backend for testing.
pub fn create_mock_cache() -> MockCacheBackend {
    MockCacheBackend::new()
}
