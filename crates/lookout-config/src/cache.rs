use serde::{Deserialize, Serialize};

fn default_cooldown_seconds() -> u64 {
    30
}

fn default_idle_ttl_seconds() -> u64 {
    300
}

fn default_similarity_threshold() -> f64 {
    0.9
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Suppression window after a candidate is accepted
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Entries not seen for this long are evicted
    #[serde(default = "default_idle_ttl_seconds")]
    pub idle_ttl_seconds: u64,
    /// Overlapping questions at least this similar count as repeats;
    /// 1.0 only matches identical text
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            idle_ttl_seconds: default_idle_ttl_seconds(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}
