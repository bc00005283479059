use async_trait::async_trait;
use lookout_types::ResearchRequest;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{Answer, ProviderMetadata, ReasoningService, ResearchError};

/// Ceiling for answers read out of an encyclopedia extract
const MAX_CONFIDENCE: f32 = 0.5;

/// Confidence for an unmatched first sentence, used for short answers
const SENTENCE_CONFIDENCE: f32 = 0.3;

#[derive(Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: ExtractQuery,
}

#[derive(Deserialize)]
struct ExtractQuery {
    pages: serde_json::Map<String, serde_json::Value>,
}

/// Looks the question up on a MediaWiki API and reads the answer out of the
/// top article's introduction
pub struct WikipediaService {
    client: reqwest::Client,
    endpoint: String,
}

impl WikipediaService {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ResearchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await?;

        let status = response.status().as_u16();
        if let Some(e) = crate::classify_status(status, "") {
            return Err(e);
        }

        response
            .json()
            .await
            .map_err(|e| ResearchError::MalformedResponse(format!("Failed to parse response: {}", e)))
    }

    async fn top_title(&self, query: &str) -> Result<String, ResearchError> {
        let found: SearchResponse = self
            .get(&[("list", "search"), ("srsearch", query), ("srlimit", "1")])
            .await?;
        found
            .query
            .search
            .into_iter()
            .next()
            .map(|hit| hit.title)
            .ok_or_else(|| ResearchError::NoAnswer(format!("no article for '{query}'")))
    }

    async fn intro(&self, title: &str) -> Result<String, ResearchError> {
        let extract: ExtractResponse = self
            .get(&[
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("exsentences", "3"),
                ("titles", title),
            ])
            .await?;
        extract
            .query
            .pages
            .values()
            .find_map(|page| page["extract"].as_str().map(str::to_string))
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ResearchError::NoAnswer(format!("article '{title}' has no summary")))
    }
}

#[async_trait]
impl ReasoningService for WikipediaService {
    async fn answer(&self, request: &ResearchRequest) -> Result<Answer, ResearchError> {
        let query = format!("{} {}", request.context_hint, request.question_text);
        let title = self.top_title(query.trim()).await?;
        let extract = self.intro(&title).await?;
        tracing::debug!(%title, "encyclopedia article found");

        answer_from_extract(&extract, &request.options)
            .ok_or_else(|| ResearchError::NoAnswer(format!("'{title}' mentions none of the options")))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "wikipedia".to_string(),
            model: "search".to_string(),
            requires_api_key: false,
        }
    }
}

/// Pick the option whose words the extract mentions most. Options arrive as
/// `"B) Paris"`; the label is answered when present. Without options the
/// first sentence is the answer.
pub fn answer_from_extract(extract: &str, options: &[String]) -> Option<Answer> {
    let haystack = extract.to_lowercase();

    if options.is_empty() {
        let sentence = extract.split('.').next().unwrap_or(extract).trim();
        if sentence.is_empty() {
            return None;
        }
        return Some(Answer {
            text: sentence.to_string(),
            confidence: SENTENCE_CONFIDENCE,
        });
    }

    let mut best: Option<(&str, &str, f32)> = None;
    for option in options {
        let (label, text) = match option.split_once(") ") {
            Some((label, text)) => (label, text),
            None => ("", option.as_str()),
        };

        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            continue;
        }

        let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
        let score = hits as f32 / words.len() as f32;
        if hits > 0 && best.is_none_or(|(_, _, top)| score > top) {
            best = Some((label, text, score));
        }
    }

    best.map(|(label, text, score)| Answer {
        text: if label.is_empty() { text } else { label }.to_string(),
        confidence: score * MAX_CONFIDENCE,
    })
}
