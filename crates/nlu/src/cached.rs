//! Single-flight caching wrapper around a backend

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use parley_core::{NluBackend, NluResult, RequestContext};

use crate::cache::BoundedCache;

/// Coalesced backend call shared by every waiter of one text
type Flight = Shared<BoxFuture<'static, Arc<NluResult>>>;

struct CacheState {
    in_flight: HashMap<String, (u64, Flight)>,
    results: BoundedCache<String, Arc<NluResult>>,
    next_flight: u64,
}

impl CacheState {
    /// Drop the in-flight entry of `text` if it still belongs to flight `id`
    fn finish(&mut self, text: &str, id: u64) -> bool {
        let owned = self
            .in_flight
            .get(text)
            .map(|(current, _)| *current == id)
            .unwrap_or(false);
        if owned {
            self.in_flight.remove(text);
        }
        owned
    }
}

/// Backend wrapper caching results per exact text
///
/// Concurrent requests for the same text await the same call. Completed
/// results are kept in a bounded FIFO cache. Failures and timeouts resolve to
/// an empty result which is logged and never cached.
///
/// Each backend call runs in its own task and settles its cache entry itself,
/// so callers dropped before completion leave nothing behind. The lock guards
/// bookkeeping only and is never held across an await.
pub struct CachedBackend {
    backend: Arc<dyn NluBackend>,
    state: Arc<Mutex<CacheState>>,
    timeout: Duration,
    prefix: String,
}

impl CachedBackend {
    pub fn new(
        backend: Arc<dyn NluBackend>,
        prefix: impl Into<String>,
        cache_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(CacheState {
                in_flight: HashMap::new(),
                results: BoundedCache::new(cache_size),
                next_flight: 0,
            })),
            timeout,
            prefix: prefix.into(),
        }
    }

    /// Name of the wrapped backend
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Number of cached results
    pub fn cached_len(&self) -> usize {
        self.state.lock().results.len()
    }

    /// Number of backend calls still running
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Whether a completed result for the text is cached
    pub fn is_cached(&self, text: &str) -> bool {
        self.state.lock().results.contains_key(text)
    }

    /// Drop all cached results (in-flight calls are kept)
    pub fn clear(&self) {
        self.state.lock().results.clear();
    }

    /// Resolve through the cache
    ///
    /// Must be called within a tokio runtime.
    pub async fn resolve(&self, text: &str, context: &RequestContext) -> Arc<NluResult> {
        let flight = {
            let mut state = self.state.lock();

            if let Some(hit) = state.results.get(text) {
                metrics::counter!("parley_nlu_cache_hits_total", "prefix" => self.prefix.clone())
                    .increment(1);
                return hit.clone();
            }

            if let Some((_, flight)) = state.in_flight.get(text) {
                metrics::counter!("parley_nlu_coalesced_total", "prefix" => self.prefix.clone())
                    .increment(1);
                flight.clone()
            } else {
                metrics::counter!("parley_nlu_cache_misses_total", "prefix" => self.prefix.clone())
                    .increment(1);
                let id = state.next_flight;
                state.next_flight = state.next_flight.wrapping_add(1);
                let flight = self.start_flight(id, text, context);
                state.in_flight.insert(text.to_string(), (id, flight.clone()));
                flight
            }
        };

        flight.await
    }

    /// Spawn the backend call; the task caches its own result
    fn start_flight(&self, id: u64, text: &str, context: &RequestContext) -> Flight {
        let task = tokio::spawn(Self::settle(
            self.backend.clone(),
            self.state.clone(),
            id,
            text.to_string(),
            context.clone(),
            self.timeout,
            self.prefix.clone(),
        ));

        let state = self.state.clone();
        let text = text.to_string();
        let prefix = self.prefix.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(prefix = %prefix, "NLU backend task aborted: {}", e);
                    state.lock().finish(&text, id);
                    Arc::new(NluResult::empty())
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn settle(
        backend: Arc<dyn NluBackend>,
        state: Arc<Mutex<CacheState>>,
        id: u64,
        text: String,
        context: RequestContext,
        timeout: Duration,
        prefix: String,
    ) -> Arc<NluResult> {
        let (result, cacheable) = Self::call(backend, &text, &context, timeout, &prefix).await;

        let mut state = state.lock();
        if state.finish(&text, id) && cacheable {
            let evicted = state.results.insert(text, result.clone());
            if evicted > 0 {
                tracing::debug!(prefix = %prefix, evicted, "Evicted cached NLU results");
            }
        }
        result
    }

    async fn call(
        backend: Arc<dyn NluBackend>,
        text: &str,
        context: &RequestContext,
        timeout: Duration,
        prefix: &str,
    ) -> (Arc<NluResult>, bool) {
        metrics::counter!("parley_nlu_backend_calls_total", "prefix" => prefix.to_string())
            .increment(1);
        let start = std::time::Instant::now();

        match tokio::time::timeout(timeout, backend.resolve(text, context)).await {
            Ok(Ok(result)) => {
                tracing::debug!(
                    prefix = %prefix,
                    backend = backend.name(),
                    intents = result.intents.len(),
                    entities = result.entities.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "NLU backend resolved"
                );
                (Arc::new(result), true)
            }
            Ok(Err(e)) => {
                metrics::counter!("parley_nlu_backend_failures_total", "prefix" => prefix.to_string())
                    .increment(1);
                tracing::warn!(
                    prefix = %prefix,
                    backend = backend.name(),
                    "NLU backend failed, continuing without intents: {}",
                    e
                );
                (Arc::new(NluResult::empty()), false)
            }
            Err(_elapsed) => {
                metrics::counter!("parley_nlu_backend_failures_total", "prefix" => prefix.to_string())
                    .increment(1);
                tracing::warn!(
                    prefix = %prefix,
                    backend = backend.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "NLU backend timed out, continuing without intents"
                );
                (Arc::new(NluResult::empty()), false)
            }
        }
    }
}
