//! Backend registry
//!
//! Maps prefixes (tenant, language, ...) to cached backends and resolves
//! which backend answers a turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use parley_config::{AiConfig, BackendConfig};
use parley_core::{Intent, NluBackend, NluResult, RequestContext};

use crate::backend::HttpNluBackend;
use crate::cached::CachedBackend;
use crate::detector::EntityDetector;
use crate::NluError;

/// Chooses the backend prefix for a request
pub trait PrefixResolver: Send + Sync {
    fn resolve_prefix(&self, default_prefix: &str, context: &RequestContext) -> String;
}

impl<F> PrefixResolver for F
where
    F: Fn(&str, &RequestContext) -> String + Send + Sync,
{
    fn resolve_prefix(&self, default_prefix: &str, context: &RequestContext) -> String {
        self(default_prefix, context)
    }
}

/// Transformation applied to texts before they reach a backend
pub type TextFilter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Forced backend answer
#[derive(Debug, Clone, PartialEq)]
pub struct MockIntent {
    /// `None` forces "no intent"
    pub intent: Option<String>,
    pub score: f64,
}

impl MockIntent {
    fn result(&self) -> NluResult {
        let intents = match &self.intent {
            Some(intent) => vec![Intent::new(intent.clone(), self.score)],
            None => Vec::new(),
        };
        NluResult::new(intents, Vec::new())
    }
}

/// Registered backend with its cache and local entity detectors
pub struct BackendHandle {
    prefix: String,
    backend: CachedBackend,
    detectors: RwLock<Vec<EntityDetector>>,
}

impl BackendHandle {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Number of cached backend results
    pub fn cached_len(&self) -> usize {
        self.backend.cached_len()
    }

    pub fn is_cached(&self, text: &str) -> bool {
        self.backend.is_cached(text)
    }

    /// Add a regex entity detector, replacing one with the same name
    pub fn set_entity_detector(&self, name: &str, pattern: &str, score: f64) -> Result<(), NluError> {
        let detector = EntityDetector::new(name, pattern, score)?;
        let mut detectors = self.detectors.write();
        detectors.retain(|existing| existing.name() != name);
        detectors.push(detector);
        tracing::debug!(prefix = %self.prefix, entity = name, "Entity detector registered");
        Ok(())
    }

    /// Resolve a text, then run local detectors over the original text
    pub async fn resolve(&self, text: &str, original: &str, context: &RequestContext) -> NluResult {
        let cached = self.backend.resolve(text, context).await;
        let mut result = NluResult::clone(&cached);

        for detector in self.detectors.read().iter() {
            detector.apply(original, &mut result.entities);
        }
        result
    }
}

/// Registry of NLU backends keyed by prefix
pub struct BackendRegistry {
    backends: RwLock<HashMap<String, Arc<BackendHandle>>>,
    default_prefix: String,
    cache_size: usize,
    timeout: Duration,
    prefix_resolver: RwLock<Option<Arc<dyn PrefixResolver>>>,
    text_filter: RwLock<Option<TextFilter>>,
    mock: RwLock<Option<MockIntent>>,
}

impl BackendRegistry {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            default_prefix: config.default_prefix.clone(),
            cache_size: config.cache_size,
            timeout: Duration::from_millis(config.request_timeout_ms),
            prefix_resolver: RwLock::new(None),
            text_filter: RwLock::new(None),
            mock: RwLock::new(None),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// Register a backend under a prefix (default prefix when `None`)
    ///
    /// Replaces a backend already registered under the same prefix.
    pub fn register_backend(&self, backend: Arc<dyn NluBackend>, prefix: Option<&str>) -> Arc<BackendHandle> {
        self.register_with(backend, prefix, self.cache_size, self.timeout)
    }

    /// Register an HTTP model backend from configuration
    pub fn register_model(&self, config: &BackendConfig) -> Result<Arc<BackendHandle>, NluError> {
        let backend = HttpNluBackend::new(config)?;
        Ok(self.register_with(
            Arc::new(backend),
            Some(config.prefix.as_str()),
            config.cache_size.unwrap_or(self.cache_size),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    fn register_with(
        &self,
        backend: Arc<dyn NluBackend>,
        prefix: Option<&str>,
        cache_size: usize,
        timeout: Duration,
    ) -> Arc<BackendHandle> {
        let prefix = prefix.unwrap_or(self.default_prefix.as_str()).to_string();
        tracing::info!(
            prefix = %prefix,
            backend = backend.name(),
            cache_size,
            "Registered NLU backend"
        );

        let handle = Arc::new(BackendHandle {
            prefix: prefix.clone(),
            backend: CachedBackend::new(backend, prefix.clone(), cache_size, timeout),
            detectors: RwLock::new(Vec::new()),
        });
        self.backends.write().insert(prefix, handle.clone());
        handle
    }

    /// Backend registered under a prefix
    pub fn get(&self, prefix: &str) -> Option<Arc<BackendHandle>> {
        self.backends.read().get(prefix).cloned()
    }

    pub fn prefixes(&self) -> Vec<String> {
        self.backends.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }

    /// Override how the prefix of a request is chosen
    pub fn set_prefix_resolver(&self, resolver: impl PrefixResolver + 'static) {
        *self.prefix_resolver.write() = Some(Arc::new(resolver));
    }

    /// Transform texts before they are sent to backends and used as cache keys
    pub fn set_text_filter(&self, filter: impl Fn(&str) -> String + Send + Sync + 'static) {
        *self.text_filter.write() = Some(Arc::new(filter));
    }

    /// Force every resolution to return a fixed intent (`None` = no intent)
    pub fn set_mock_intent(&self, intent: Option<&str>, score: f64) {
        *self.mock.write() = Some(MockIntent {
            intent: intent.map(str::to_string),
            score,
        });
    }

    pub fn clear_mock_intent(&self) {
        *self.mock.write() = None;
    }

    /// Result forced by the mock, if one is set
    pub fn mock_result(&self) -> Option<NluResult> {
        self.mock.read().as_ref().map(MockIntent::result)
    }

    /// Prefix answering a request
    pub fn get_prefix(&self, context: &RequestContext) -> String {
        let resolver = self.prefix_resolver.read().clone();
        match resolver {
            Some(resolver) => resolver.resolve_prefix(&self.default_prefix, context),
            None => self.default_prefix.clone(),
        }
    }

    /// Resolve intents and entities for a text
    ///
    /// Never fails: unknown prefixes fall back to the default backend, and
    /// missing backends, empty texts and backend failures yield an empty result.
    pub async fn resolve(&self, text: &str, context: &RequestContext) -> NluResult {
        if let Some(mock) = self.mock_result() {
            return mock;
        }

        let filter = self.text_filter.read().clone();
        let filtered = match filter {
            Some(filter) => filter(text),
            None => text.to_string(),
        };
        if filtered.trim().is_empty() {
            return NluResult::empty();
        }

        let prefix = self.get_prefix(context);
        let handle = match self.get(&prefix) {
            Some(handle) => handle,
            None => match self.get(&self.default_prefix) {
                Some(handle) => {
                    tracing::debug!(prefix = %prefix, "No backend for prefix, using default");
                    handle
                }
                None => {
                    tracing::warn!(prefix = %prefix, "No NLU backend registered");
                    return NluResult::empty();
                }
            },
        };

        handle.resolve(&filtered, text, context).await
    }
}
