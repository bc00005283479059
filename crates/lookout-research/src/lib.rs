mod answers;
mod anthropic;
mod client;
mod knowledge;
mod openai;
mod prompt;
mod providers;
mod secret;
mod wikipedia;

use lookout_types::ResearchRequest;

pub use answers::AnswerCache;
pub use anthropic::AnthropicService;
pub use client::{ResearchClient, RetryPolicy};
pub use knowledge::KnowledgeBaseService;
pub use openai::OpenAiService;
pub use prompt::{build_prompt, classify_status, parse_answer};
pub use providers::services_from_config;
pub use secret::{ApiToken, EnvSecretStore, SecretError, SecretStore, StaticSecretStore};
pub use wikipedia::{WikipediaService, answer_from_extract};

/// Reasoning provider interface
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    /// Answer a single question; one network round trip, no retries
    async fn answer(&self, request: &ResearchRequest) -> Result<Answer, ResearchError>;

    /// Provider metadata
    fn metadata(&self) -> ProviderMetadata;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Advisory, 0.0 - 1.0
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    pub name: String,
    pub model: String,
    pub requires_api_key: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("service unavailable: HTTP {0}")]
    ServerError(u16),

    #[error("unreadable response: {0}")]
    MalformedResponse(String),

    #[error("authentication rejected")]
    Authentication,

    #[error("request rejected: {0}")]
    InvalidRequest(String),

    #[error("no answer found: {0}")]
    NoAnswer(String),
}

impl From<reqwest::Error> for ResearchError {
    /// Requests that could not even be built (bad URL, bad header) never
    /// succeed on retry
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ResearchError::InvalidRequest(e.to_string())
        } else if e.is_timeout() {
            ResearchError::Timeout
        } else {
            ResearchError::Network(e)
        }
    }
}

impl ResearchError {
    /// Transient failures are retried with backoff; the rest fail at once
    /// so a rejected key or request does not keep spending quota
    pub fn is_transient(&self) -> bool {
        match self {
            ResearchError::Timeout
            | ResearchError::Network(_)
            | ResearchError::RateLimited
            | ResearchError::ServerError(_)
            | ResearchError::MalformedResponse(_) => true,
            ResearchError::Authentication
            | ResearchError::InvalidRequest(_)
            | ResearchError::NoAnswer(_) => false,
        }
    }

    /// Failures that will recur on every question until the setup changes
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchError::Authentication | ResearchError::InvalidRequest(_)
        )
    }
}
