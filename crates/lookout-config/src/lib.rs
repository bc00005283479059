use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use self::cache::CacheConfig;
use self::capture::CaptureConfig;
use self::detection::DetectionConfig;
use self::research::{FallbackProvider, ResearchConfig};
use self::response::ResponseConfig;
use self::safety::SafetyConfig;
use self::session::SessionConfig;

pub mod cache;
pub mod capture;
pub mod detection;
pub mod research;
pub mod response;
pub mod safety;
pub mod session;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no detector configured")]
    NoDetectors,

    #[error("no detector could be initialized")]
    NoUsableDetectors,

    #[error("no research endpoint configured")]
    MissingEndpoint,

    #[error("no credential handle configured")]
    MissingCredential,

    #[error("credential could not be resolved: {0}")]
    Credential(String),

    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

fn out_of_range(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub detection: DetectionConfig,
    pub cache: CacheConfig,
    pub research: ResearchConfig,
    pub response: ResponseConfig,
    pub session: SessionConfig,
    pub safety: SafetyConfig,
}

impl Config {
    /// Defaults with environment overrides applied
    pub fn new() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&data)?;
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(ms) = env::var("LOOKOUT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.capture.poll_interval_ms = ms;
        }

        if let Some(minutes) = env::var("LOOKOUT_SESSION_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.session.duration_minutes = minutes;
        }

        if let Ok(endpoint) = env::var("LOOKOUT_API_ENDPOINT") {
            self.research.api_endpoint = endpoint;
        }

        if let Ok(handle) = env::var("LOOKOUT_CREDENTIAL_HANDLE") {
            self.research.credential_handle = handle;
        }
    }

    /// Fatal checks run once before the monitoring loop starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.poll_interval_ms < 50 {
            return Err(out_of_range("capture.poll_interval_ms", "must be at least 50"));
        }
        if self.capture.region.is_empty() {
            return Err(out_of_range("capture.region", "width and height must be non-zero"));
        }
        if !(1..=600).contains(&self.session.duration_minutes) {
            return Err(out_of_range(
                "session.duration_minutes",
                "must be between 1 and 600",
            ));
        }
        if let Some(max) = self.session.max_questions
            && !(1..=1000).contains(&max)
        {
            return Err(out_of_range(
                "session.max_questions",
                "must be between 1 and 1000",
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_floor) {
            return Err(out_of_range(
                "detection.confidence_floor",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.research.min_answer_confidence) {
            return Err(out_of_range(
                "research.min_answer_confidence",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.cache.similarity_threshold) {
            return Err(out_of_range(
                "cache.similarity_threshold",
                "must be between 0 and 1",
            ));
        }
        for (field, value) in [
            ("response.typo_probability", self.response.typo_probability),
            ("response.overshoot_probability", self.response.overshoot_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(out_of_range(field, "must be between 0 and 1"));
            }
        }
        if self.research.max_research_retries == 0 {
            return Err(out_of_range(
                "research.max_research_retries",
                "at least one attempt is required",
            ));
        }
        if self.detection.timeout_ms == 0 {
            return Err(out_of_range("detection.timeout_ms", "must be positive"));
        }
        if self.detection.detectors.is_empty() {
            return Err(ConfigError::NoDetectors);
        }
        if self.research.api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.research.credential_handle.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        for fallback in &self.research.fallbacks {
            match fallback {
                FallbackProvider::OpenAi {
                    api_endpoint,
                    credential_handle,
                    ..
                } => {
                    if api_endpoint.trim().is_empty() {
                        return Err(ConfigError::MissingEndpoint);
                    }
                    if credential_handle.trim().is_empty() {
                        return Err(ConfigError::MissingCredential);
                    }
                }
                FallbackProvider::Wikipedia { api_endpoint } => {
                    if api_endpoint.trim().is_empty() {
                        return Err(ConfigError::MissingEndpoint);
                    }
                }
                FallbackProvider::KnowledgeBase { path } => {
                    if path.trim().is_empty() {
                        return Err(out_of_range(
                            "research.fallbacks",
                            "knowledge base path is empty",
                        ));
                    }
                }
            }
        }

        let response = &self.response;
        for (field, range) in [
            ("response.think_delay_ms", response.think_delay_ms),
            ("response.move_duration_ms", response.move_duration_ms),
            ("response.click_delay_ms", response.click_delay_ms),
            ("response.typing_delay_ms", response.typing_delay_ms),
        ] {
            if !range.is_ordered() {
                return Err(out_of_range(field, "min must not exceed max"));
            }
        }
        if response.path_points == 0 {
            return Err(out_of_range("response.path_points", "must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorConfig;
    use crate::response::AnswerStyle;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.poll_interval_ms, 500);
        assert_eq!(config.cache.cooldown_seconds, 30);
        assert_eq!(config.research.max_research_retries, 3);
        assert_eq!(config.detection.detectors, vec![DetectorConfig::HeuristicText]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "capture": { "poll_interval_ms": 250 },
            "detection": {
                "detectors": [
                    { "kind": "template", "path": "marker.png", "label": "Next question" },
                    { "kind": "heuristic_text" }
                ]
            },
            "response": { "answer_style": "true_false" },
            "session": { "context_label": "biology", "max_questions": 5 }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.capture.poll_interval_ms, 250);
        assert_eq!(config.capture.timeout_ms, 2000);
        assert_eq!(config.detection.detectors.len(), 2);
        assert_eq!(
            config.detection.detectors[0],
            DetectorConfig::Template {
                path: "marker.png".into(),
                label: "Next question".into(),
                threshold: 0.8,
            }
        );
        assert_eq!(config.response.answer_style, AnswerStyle::TrueFalse);
        assert_eq!(config.session.context_label, "biology");
        assert_eq!(config.session.max_questions, Some(5));
        assert_eq!(config.session.duration_minutes, 60);
    }

    #[test]
    fn fallback_providers_parse_in_order() {
        let json = r#"{
            "research": {
                "fallbacks": [
                    { "kind": "openai", "model": "gpt-4o" },
                    { "kind": "wikipedia" },
                    { "kind": "knowledge_base", "path": "data/answers.json" }
                ],
                "answer_cache_size": 10
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        let fallbacks = &config.research.fallbacks;
        assert_eq!(fallbacks.len(), 3);
        assert_eq!(
            fallbacks[0],
            FallbackProvider::OpenAi {
                api_endpoint: "https://api.openai.com/v1/chat/completions".into(),
                credential_handle: "OPENAI_API_KEY".into(),
                model: "gpt-4o".into(),
            }
        );
        assert!(matches!(fallbacks[1], FallbackProvider::Wikipedia { .. }));
        assert_eq!(config.research.answer_cache_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fallback_without_credential_handle_is_fatal() {
        let mut config = Config::default();
        config.research.fallbacks.push(FallbackProvider::OpenAi {
            api_endpoint: "https://example.test/v1".into(),
            credential_handle: " ".into(),
            model: "m".into(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::MissingCredential)));
    }

    #[test]
    fn missing_detectors_is_fatal() {
        let mut config = Config::default();
        config.detection.detectors.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoDetectors)));
    }

    #[test]
    fn missing_endpoint_is_fatal() {
        let mut config = Config::default();
        config.research.api_endpoint = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::MissingEndpoint)));
    }

    #[test]
    fn duration_bounds() {
        let mut config = Config::default();
        config.session.duration_minutes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "session.duration_minutes",
                ..
            })
        ));

        config.session.duration_minutes = 601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn confidence_floor_bounds() {
        let mut config = Config::default();
        config.detection.confidence_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn recognition_needs_a_time_limit() {
        let mut config = Config::default();
        assert_eq!(config.detection.timeout_ms, 5000);
        config.detection.timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "detection.timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn fuzzy_and_humanizing_knobs_are_fractions() {
        let config = Config::default();
        assert_eq!(config.cache.similarity_threshold, 0.9);
        assert_eq!(config.response.typo_probability, 0.02);
        assert_eq!(config.response.overshoot_probability, 0.15);

        let mut fuzzy = config.clone();
        fuzzy.cache.similarity_threshold = 1.5;
        assert!(matches!(
            fuzzy.validate(),
            Err(ConfigError::OutOfRange {
                field: "cache.similarity_threshold",
                ..
            })
        ));

        let mut typos = config;
        typos.response.typo_probability = -0.1;
        assert!(matches!(
            typos.validate(),
            Err(ConfigError::OutOfRange {
                field: "response.typo_probability",
                ..
            })
        ));
    }
}
