use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use lookout_config::ConfigError;
use lookout_types::ResearchRequest;

use crate::{Answer, ProviderMetadata, ReasoningService, ResearchError};

const KNOWN_ANSWER_CONFIDENCE: f32 = 0.7;

/// Answers from a local JSON object of `"keyword": "answer"` pairs. The
/// longest keyword found in the question wins.
pub struct KnowledgeBaseService {
    entries: Vec<(String, String)>,
}

impl KnowledgeBaseService {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(key, answer)| (key.trim().to_lowercase(), answer))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&data)?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, question: &str) -> Option<&str> {
        let question = question.to_lowercase();
        self.entries
            .iter()
            .find(|(key, _)| question.contains(key.as_str()))
            .map(|(_, answer)| answer.as_str())
    }
}

#[async_trait]
impl ReasoningService for KnowledgeBaseService {
    async fn answer(&self, request: &ResearchRequest) -> Result<Answer, ResearchError> {
        self.lookup(&request.question_text)
            .map(|text| Answer {
                text: text.to_string(),
                confidence: KNOWN_ANSWER_CONFIDENCE,
            })
            .ok_or_else(|| ResearchError::NoAnswer("no keyword matched".into()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "knowledge_base".to_string(),
            model: format!("{} entries", self.entries.len()),
            requires_api_key: false,
        }
    }
}
