use std::collections::HashMap;
use std::time::{Duration, Instant};

use lookout_config::cache::CacheConfig;
use lookout_types::{CaptureRegion, QuestionCandidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Suppress,
}

/// Near-identical wording counts as the same question at or above this
pub const DEFAULT_SIMILARITY: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content_hash: u64,
    pub text_hash: u64,
    pub normalized_text: String,
    pub region: CaptureRegion,
    pub last_seen_at: Instant,
    pub times_seen: u32,
    pub suppressed_until: Instant,
}

/// Deduplicates repeated sightings of the same on-screen question
pub struct CandidateCache {
    entries: HashMap<u64, CacheEntry>,
    cooldown: Duration,
    idle_ttl: Duration,
    similarity: f64,
}

impl CandidateCache {
    pub fn new(cooldown: Duration, idle_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            cooldown,
            idle_ttl,
            similarity: DEFAULT_SIMILARITY,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cooldown_seconds),
            Duration::from_secs(config.idle_ttl_seconds),
        )
        .with_similarity(config.similarity_threshold)
    }

    /// 1.0 turns fuzzy matching off
    pub fn with_similarity(mut self, threshold: f64) -> Self {
        self.similarity = threshold;
        self
    }

    /// Suppress when the same content is still inside its window. Content
    /// matches on the exact hash, or on equal text with an overlapping
    /// region so OCR box jitter across a grid line does not retrigger, or
    /// on near-identical text there so a misread letter does not either.
    pub fn admit(&mut self, candidate: &QuestionCandidate, now: Instant) -> Admission {
        self.evict_idle(now);

        let key = self.find(candidate).unwrap_or(candidate.content_hash);

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_seen_at = now;
            entry.times_seen = entry.times_seen.saturating_add(1);
            entry.region = candidate.bounding_region;

            if now < entry.suppressed_until {
                return Admission::Suppress;
            }

            entry.suppressed_until = now + self.cooldown;
            return Admission::Accept;
        }

        self.entries.insert(
            candidate.content_hash,
            CacheEntry {
                content_hash: candidate.content_hash,
                text_hash: candidate.text_hash,
                normalized_text: candidate.normalized_text.clone(),
                region: candidate.bounding_region,
                last_seen_at: now,
                times_seen: 1,
                suppressed_until: now + self.cooldown,
            },
        );
        Admission::Accept
    }

    fn find(&self, candidate: &QuestionCandidate) -> Option<u64> {
        if self.entries.contains_key(&candidate.content_hash) {
            return Some(candidate.content_hash);
        }
        let overlapping = || {
            self.entries
                .values()
                .filter(|e| e.region.overlaps(&candidate.bounding_region))
        };

        if let Some(entry) = overlapping().find(|e| e.text_hash == candidate.text_hash) {
            return Some(entry.content_hash);
        }
        if self.similarity >= 1.0 {
            return None;
        }

        overlapping()
            .find(|e| self.is_near_duplicate(&e.normalized_text, &candidate.normalized_text))
            .map(|e| e.content_hash)
    }

    /// Numbers must match exactly: "Question 4" and "Question 5" differ by
    /// one character but are different questions
    fn is_near_duplicate(&self, seen: &str, text: &str) -> bool {
        let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
        digits(seen) == digits(text) && strsim::normalized_levenshtein(seen, text) >= self.similarity
    }

    /// Entries still suppressing are kept even when idle
    fn evict_idle(&mut self, now: Instant) {
        let ttl = self.idle_ttl;
        self.entries.retain(|_, e| {
            now < e.suppressed_until || now.saturating_duration_since(e.last_seen_at) < ttl
        });
    }

    pub fn get(&self, content_hash: u64) -> Option<&CacheEntry> {
        self.entries.get(&content_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{content_hash, normalize_text, text_hash};

    fn candidate(text: &str, region: CaptureRegion) -> QuestionCandidate {
        let normalized = normalize_text(text);
        QuestionCandidate {
            content_hash: content_hash(&normalized, &region, 64),
            text_hash: text_hash(&normalized),
            extracted_text: text.into(),
            normalized_text: normalized,
            bounding_region: region,
            options: Vec::new(),
            confidence: 0.9,
            source: "test".into(),
            timestamp: Instant::now(),
        }
    }

    fn cache() -> CandidateCache {
        CandidateCache::new(Duration::from_secs(30), Duration::from_secs(300))
    }

    #[test]
    fn repeat_inside_window_is_suppressed() {
        let mut cache = cache();
        let c = candidate("What is 2 + 2?", CaptureRegion::new(100, 100, 200, 20));
        let t0 = Instant::now();

        assert_eq!(cache.admit(&c, t0), Admission::Accept);
        for i in 1..10 {
            assert_eq!(
                cache.admit(&c, t0 + Duration::from_secs(i)),
                Admission::Suppress
            );
        }
        assert_eq!(cache.get(c.content_hash).unwrap().times_seen, 10);
    }

    #[test]
    fn window_expiry_reopens() {
        let mut cache = cache();
        let c = candidate("What is 2 + 2?", CaptureRegion::new(100, 100, 200, 20));
        let t0 = Instant::now();

        assert_eq!(cache.admit(&c, t0), Admission::Accept);
        assert_eq!(cache.admit(&c, t0 + Duration::from_secs(29)), Admission::Suppress);
        assert_eq!(cache.admit(&c, t0 + Duration::from_secs(30)), Admission::Accept);
        assert_eq!(cache.admit(&c, t0 + Duration::from_secs(31)), Admission::Suppress);
    }

    #[test]
    fn same_text_overlapping_region_across_grid_line() {
        let mut cache = cache();
        // 63 and 65 fall in different grid cells
        let a = candidate("Name the largest ocean?", CaptureRegion::new(63, 10, 200, 20));
        let b = candidate("name the  LARGEST ocean?", CaptureRegion::new(65, 12, 200, 20));
        assert_ne!(a.content_hash, b.content_hash);

        let t0 = Instant::now();
        assert_eq!(cache.admit(&a, t0), Admission::Accept);
        assert_eq!(cache.admit(&b, t0), Admission::Suppress);
    }

    #[test]
    fn same_text_elsewhere_is_distinct() {
        let mut cache = cache();
        let a = candidate("Name the largest ocean?", CaptureRegion::new(0, 0, 200, 20));
        let b = candidate("Name the largest ocean?", CaptureRegion::new(0, 400, 200, 20));

        let t0 = Instant::now();
        assert_eq!(cache.admit(&a, t0), Admission::Accept);
        assert_eq!(cache.admit(&b, t0), Admission::Accept);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn misread_letter_is_still_a_repeat() {
        let mut cache = cache();
        let a = candidate("Which planet is known as the red planet?", CaptureRegion::new(10, 10, 300, 20));
        let b = candidate("Which planet is known as the rcd planet?", CaptureRegion::new(12, 10, 300, 20));
        assert_ne!(a.text_hash, b.text_hash);

        let t0 = Instant::now();
        assert_eq!(cache.admit(&a, t0), Admission::Accept);
        assert_eq!(cache.admit(&b, t0 + Duration::from_secs(1)), Admission::Suppress);
        assert_eq!(cache.len(), 1);

        let mut exact = CandidateCache::new(Duration::from_secs(30), Duration::from_secs(300)).with_similarity(1.0);
        assert_eq!(exact.admit(&a, t0), Admission::Accept);
        assert_eq!(exact.admit(&b, t0), Admission::Accept);
    }

    #[test]
    fn next_numbered_question_is_not_a_repeat() {
        let mut cache = cache();
        let region = CaptureRegion::new(10, 10, 300, 20);
        let a = candidate("Question 4: which planet is known as the red planet?", region);
        let b = candidate("Question 5: which planet is known as the red planet?", region);

        let t0 = Instant::now();
        assert_eq!(cache.admit(&a, t0), Admission::Accept);
        assert_eq!(cache.admit(&b, t0), Admission::Accept);
    }

    #[test]
    fn different_question_in_same_place_is_accepted() {
        let mut cache = cache();
        let region = CaptureRegion::new(10, 10, 300, 20);

        let t0 = Instant::now();
        assert_eq!(cache.admit(&candidate("Which planet is the largest?", region), t0), Admission::Accept);
        assert_eq!(cache.admit(&candidate("Which ocean is the largest?", region), t0), Admission::Accept);
    }

    #[test]
    fn idle_entries_are_evicted_lazily() {
        let mut cache = CandidateCache::new(Duration::from_secs(1), Duration::from_secs(5));
        let a = candidate("First question here?", CaptureRegion::new(0, 0, 200, 20));
        let b = candidate("Second question here?", CaptureRegion::new(0, 300, 200, 20));

        let t0 = Instant::now();
        cache.admit(&a, t0);
        assert_eq!(cache.len(), 1);

        cache.admit(&b, t0 + Duration::from_secs(6));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(a.content_hash).is_none());
    }
}
