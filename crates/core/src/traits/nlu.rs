//! NLU backend trait

use async_trait::async_trait;

use crate::{NluResult, RequestContext, Result};

/// Natural language understanding backend
///
/// Implementations:
/// - `HttpNluBackend` - remote model served over HTTP
/// - test doubles in integration tests
///
/// Errors returned here never reach the scoring path: the registry maps them
/// to an empty result and logs a warning.
///
/// # Example
///
/// ```ignore
/// let backend: Arc<dyn NluBackend> = Arc::new(HttpNluBackend::new(config)?);
/// let result = backend.resolve("I want a pizza", &RequestContext::default()).await?;
/// println!("{:?}", result.top_intent());
/// ```
#[async_trait]
pub trait NluBackend: Send + Sync + 'static {
    /// Resolve intents and entities for a text
    async fn resolve(&self, text: &str, context: &RequestContext) -> Result<NluResult>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Intent};
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl NluBackend for Echo {
        async fn resolve(&self, text: &str, _context: &RequestContext) -> Result<NluResult> {
            if text.is_empty() {
                return Err(Error::InvalidResponse("empty text".to_string()));
            }
            Ok(NluResult::new(vec![Intent::new(text, 1.0)], Vec::new()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_backend_as_trait_object() {
        let backend: Arc<dyn NluBackend> = Arc::new(Echo);
        let result = backend.resolve("greeting", &RequestContext::default()).await.unwrap();
        assert_eq!(result.intents.len(), 1);
        assert_eq!(result.intents[0].intent.as_deref(), Some("greeting"));
        assert!(backend.resolve("", &RequestContext::default()).await.is_err());
        assert_eq!(backend.name(), "echo");
    }
}
