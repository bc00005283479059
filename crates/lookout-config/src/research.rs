use serde::{Deserialize, Serialize};

fn default_api_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_credential_handle() -> String {
    "LOOKOUT_API_KEY".to_string()
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_max_tokens() -> u32 {
    200
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_openai_credential_handle() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_wikipedia_endpoint() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_answer_cache_size() -> usize {
    100
}

fn default_max_research_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

/// A provider consulted, in list order, once every earlier one has failed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackProvider {
    /// OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    OpenAi {
        #[serde(default = "default_openai_endpoint")]
        api_endpoint: String,
        #[serde(default = "default_openai_credential_handle")]
        credential_handle: String,
        #[serde(default = "default_openai_model")]
        model: String,
    },
    /// Encyclopedia lookup matched against the options
    Wikipedia {
        #[serde(default = "default_wikipedia_endpoint")]
        api_endpoint: String,
    },
    /// Local JSON object mapping question keywords to answers
    KnowledgeBase { path: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Name the secret store resolves to the API token; the token itself
    /// never appears in configuration
    #[serde(default = "default_credential_handle")]
    pub credential_handle: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Total attempts for transient failures
    #[serde(default = "default_max_research_retries")]
    pub max_research_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Answers below this confidence are not acted on
    #[serde(default)]
    pub min_answer_confidence: f32,
    #[serde(default)]
    pub fallbacks: Vec<FallbackProvider>,
    /// Answers kept per run, keyed on question and options; 0 disables
    #[serde(default = "default_answer_cache_size")]
    pub answer_cache_size: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            credential_handle: default_credential_handle(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_research_retries: default_max_research_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            min_answer_confidence: 0.0,
            fallbacks: Vec::new(),
            answer_cache_size: default_answer_cache_size(),
        }
    }
}
