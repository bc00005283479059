use serde::{Deserialize, Serialize};

fn default_abort_hotkey() -> String {
    "Escape".to_string()
}

fn default_poll_ms() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyConfig {
    /// Global hotkey that forces the session to halt, e.g. "Escape" or "control+shift+KeyQ"
    #[serde(default = "default_abort_hotkey")]
    pub abort_hotkey: String,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            abort_hotkey: default_abort_hotkey(),
            poll_ms: default_poll_ms(),
        }
    }
}
