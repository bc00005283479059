use std::sync::Arc;

use lookout_config::research::{FallbackProvider, ResearchConfig};

use crate::secret::{SecretError, SecretStore};
use crate::{AnthropicService, KnowledgeBaseService, OpenAiService, ReasoningService, WikipediaService};

/// Build the primary provider followed by the configured fallbacks.
///
/// The primary credential must resolve. A fallback whose credential or file
/// is unavailable is left out of the chain with a warning.
pub fn services_from_config(
    config: &ResearchConfig,
    secrets: &dyn SecretStore,
) -> Result<Vec<Arc<dyn ReasoningService>>, SecretError> {
    let token = secrets.resolve(&config.credential_handle)?;
    let mut services: Vec<Arc<dyn ReasoningService>> =
        vec![Arc::new(AnthropicService::from_config(config, token))];

    for fallback in &config.fallbacks {
        match fallback {
            FallbackProvider::OpenAi {
                api_endpoint,
                credential_handle,
                model,
            } => match secrets.resolve(credential_handle) {
                Ok(token) => services.push(Arc::new(OpenAiService::new(
                    api_endpoint.clone(),
                    token,
                    model.clone(),
                    config.max_tokens,
                ))),
                Err(e) => tracing::warn!("openai fallback skipped: {}", e),
            },
            FallbackProvider::Wikipedia { api_endpoint } => {
                services.push(Arc::new(WikipediaService::new(api_endpoint.clone())));
            }
            FallbackProvider::KnowledgeBase { path } => match KnowledgeBaseService::load(path) {
                Ok(knowledge) => services.push(Arc::new(knowledge)),
                Err(e) => tracing::warn!(%path, "knowledge base fallback skipped: {}", e),
            },
        }
    }

    Ok(services)
}
