use serde::{Deserialize, Serialize};

fn default_duration_minutes() -> u64 {
    60
}

fn default_cooldown_ms() -> u64 {
    2000
}

fn default_max_consecutive_failures() -> u32 {
    3
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Free-form subject hint passed along with every question
    pub context_label: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u64,
    /// Pause after each research/response cycle
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Stop gracefully after this many answers
    pub max_questions: Option<u32>,
    /// Terminal research failures in a row before the session gives up
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_label: String::new(),
            duration_minutes: default_duration_minutes(),
            cooldown_ms: default_cooldown_ms(),
            max_questions: None,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}
