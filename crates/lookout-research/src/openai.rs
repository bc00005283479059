use async_trait::async_trait;
use lookout_types::ResearchRequest;
use serde_json::json;

use crate::prompt::{build_prompt, classify_status, parse_answer};
use crate::secret::ApiToken;
use crate::{Answer, ProviderMetadata, ReasoningService, ResearchError};

/// Chat-completions reasoning provider
#[derive(Clone)]
pub struct OpenAiService {
    client: reqwest::Client,
    endpoint: String,
    token: ApiToken,
    model: String,
    max_tokens: u32,
}

impl OpenAiService {
    pub fn new(endpoint: String, token: ApiToken, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            token,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl ReasoningService for OpenAiService {
    async fn answer(&self, request: &ResearchRequest) -> Result<Answer, ResearchError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": format!("Context: {}", request.context_hint) },
                { "role": "user", "content": build_prompt(request) }
            ]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.token.expose())
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

        let text = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| ResearchError::MalformedResponse("No message in response".to_string()))?;

        parse_answer(text)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "openai".to_string(),
            model: self.model.clone(),
            requires_api_key: true,
        }
    }
}
