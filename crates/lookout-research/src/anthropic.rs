use async_trait::async_trait;
use lookout_config::research::ResearchConfig;
use lookout_types::ResearchRequest;
use serde_json::json;

use crate::prompt::{build_prompt, classify_status, parse_answer};
use crate::secret::ApiToken;
use crate::{Answer, ProviderMetadata, ReasoningService, ResearchError};

const API_VERSION: &str = "2023-06-01";

/// Messages-API reasoning provider
#[derive(Clone)]
pub struct AnthropicService {
    client: reqwest::Client,
    endpoint: String,
    token: ApiToken,
    model: String,
    max_tokens: u32,
}

impl AnthropicService {
    pub fn new(endpoint: String, token: ApiToken, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            token,
            model,
            max_tokens,
        }
    }

    pub fn from_config(config: &ResearchConfig, token: ApiToken) -> Self {
        Self::new(
            config.api_endpoint.clone(),
            token,
            config.model.clone(),
            config.max_tokens,
        )
    }
}

#[async_trait]
impl ReasoningService for AnthropicService {
    async fn answer(&self, request: &ResearchRequest) -> Result<Answer, ResearchError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "messages": [
                { "role": "user", "content": build_prompt(request) }
            ]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", self.token.expose())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail)
                .unwrap_or_else(|| ResearchError::InvalidRequest(format!("HTTP {status}"))));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            ResearchError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;

        let text = json["content"]
            .get(0)
            .and_then(|c| c["text"].as_str())
            .ok_or_else(|| ResearchError::MalformedResponse("No text in response".to_string()))?;

        parse_answer(text)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "anthropic".to_string(),
            model: self.model.clone(),
            requires_api_key: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_endpoint_is_not_retryable() {
        let service = AnthropicService::new(
            "not a url".into(),
            ApiToken::new("key"),
            "model".into(),
            16,
        );

        let err = service
            .answer(&ResearchRequest::new("q", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidRequest(_)), "{err:?}");
        assert!(!err.is_transient());
    }
}
