//! HTTP model backend

use std::time::Duration;

use async_trait::async_trait;
use parley_config::BackendConfig;
use parley_core::{Intent, NluBackend, NluResult, RequestContext};
use reqwest::Client;
use serde_json::Value;

use crate::NluError;

/// NLU model served over HTTP
///
/// Issues `GET {endpoint}/{model}?text=...` and accepts either
/// `{ "intents": [...], "entities": [...] }` or a bare intent array.
#[derive(Clone)]
pub struct HttpNluBackend {
    client: Client,
    endpoint: String,
    model: String,
    name: String,
    timeout_ms: u64,
}

impl HttpNluBackend {
    /// Create a backend for one model
    pub fn new(config: &BackendConfig) -> Result<Self, NluError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| NluError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            name: format!("http:{}", config.model),
            timeout_ms: config.timeout_ms,
        })
    }

    fn model_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.model)
    }

    async fn execute_request(&self, text: &str) -> Result<NluResult, NluError> {
        let response = self
            .client
            .get(self.model_url())
            .query(&[("text", text)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NluError::Timeout(self.timeout_ms)
                } else {
                    NluError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(NluError::Network(format!("Model error {}: {}", status, error)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NluError::InvalidResponse(e.to_string()))?;

        parse_model_response(body)
    }
}

/// Decode a model payload
pub fn parse_model_response(body: Value) -> Result<NluResult, NluError> {
    let is_result = matches!(
        &body,
        Value::Object(map) if map.contains_key("intents") || map.contains_key("entities")
    );

    match body {
        Value::Array(_) => serde_json::from_value::<Vec<Intent>>(body)
            .map(|intents| NluResult::new(intents, Vec::new()))
            .map_err(|e| NluError::InvalidResponse(e.to_string())),
        Value::Object(_) if is_result => {
            serde_json::from_value(body).map_err(|e| NluError::InvalidResponse(e.to_string()))
        }
        other => Err(NluError::InvalidResponse(format!(
            "Unexpected model payload: {}",
            other
        ))),
    }
}

#[async_trait]
impl NluBackend for HttpNluBackend {
    async fn resolve(&self, text: &str, _context: &RequestContext) -> parley_core::Result<NluResult> {
        Ok(self.execute_request(text).await?)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::EntityValue;
    use serde_json::json;

    #[test]
    fn test_parse_full_payload() {
        let result = parse_model_response(json!({
            "intents": [
                { "intent": "order", "score": 0.97, "entities": [
                    { "entity": "item", "value": "pizza", "score": 0.9 }
                ]}
            ],
            "entities": [
                { "entity": "count", "value": 2.0, "start": 0, "end": 1 }
            ]
        }))
        .unwrap();

        assert_eq!(result.intents.len(), 1);
        assert_eq!(result.intents[0].name(), Some("order"));
        assert_eq!(result.entities[0].value, EntityValue::Number(2.0));
        assert_eq!(result.entities[0].score, 1.0);
        assert_eq!(result.entities[0].span_len(), Some(1));
    }

    #[test]
    fn test_parse_intent_array() {
        let result = parse_model_response(json!([
            { "intent": "yes", "score": 0.99 },
            { "intent": null, "score": 0.01 }
        ]))
        .unwrap();

        assert_eq!(result.intents.len(), 2);
        assert_eq!(result.intents[1].intent, None);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(
            parse_model_response(json!({ "error": "model not loaded" })),
            Err(NluError::InvalidResponse(_))
        ));
        assert!(parse_model_response(json!([{ "score": "high" }])).is_err());
        assert!(parse_model_response(json!("nope")).is_err());
    }

    #[test]
    fn test_model_url() {
        let backend = HttpNluBackend::new(&BackendConfig {
            prefix: "default".to_string(),
            model: "bot-en".to_string(),
            endpoint: "http://localhost:8080/models/".to_string(),
            timeout_ms: 500,
            cache_size: None,
        })
        .unwrap();

        assert_eq!(backend.model_url(), "http://localhost:8080/models/bot-en");
        assert_eq!(backend.name(), "http:bot-en");
    }
}
