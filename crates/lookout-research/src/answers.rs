use std::collections::{HashMap, VecDeque};

use lookout_types::ResearchRequest;
use sha2::{Digest, Sha256};

use crate::Answer;

/// Answers keyed on question and options, dropping the oldest entry once
/// `capacity` is reached
pub struct AnswerCache {
    capacity: usize,
    order: VecDeque<u64>,
    entries: HashMap<u64, Answer>,
}

impl AnswerCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// Case and spacing do not change the key
    pub fn key(request: &ResearchRequest) -> u64 {
        let mut hasher = Sha256::new();
        let fold = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        hasher.update(fold(&request.question_text).as_bytes());
        for option in &request.options {
            hasher.update(b"|");
            hasher.update(fold(option).as_bytes());
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }

    pub fn get(&self, request: &ResearchRequest) -> Option<&Answer> {
        self.entries.get(&Self::key(request))
    }

    pub fn insert(&mut self, request: &ResearchRequest, answer: Answer) {
        let key = Self::key(request);
        if self.entries.insert(key, answer).is_some() {
            return;
        }

        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question: &str, options: &[&str]) -> ResearchRequest {
        let mut request = ResearchRequest::new(question, "quiz");
        request.options = options.iter().map(|o| o.to_string()).collect();
        request
    }

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.into(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_same_question_hits_regardless_of_spacing() {
        let mut cache = AnswerCache::new(10);
        cache.insert(&request("Capital of Spain?", &["A) Paris", "B) Madrid"]), answer("B"));

        let hit = cache.get(&request("capital  of SPAIN?", &["A) Paris", "B)  Madrid"]));
        assert_eq!(hit.map(|a| a.text.as_str()), Some("B"));
    }

    #[test]
    fn test_options_are_part_of_the_key() {
        let mut cache = AnswerCache::new(10);
        cache.insert(&request("Capital of Spain?", &["A) Paris", "B) Madrid"]), answer("B"));

        assert!(cache.get(&request("Capital of Spain?", &["A) Madrid", "B) Paris"])).is_none());
        assert!(cache.get(&request("Capital of Spain?", &[])).is_none());
    }

    #[test]
    fn test_oldest_entry_is_evicted_first() {
        let mut cache = AnswerCache::new(2);
        cache.insert(&request("one", &[]), answer("1"));
        cache.insert(&request("two", &[]), answer("2"));
        // Overwriting does not refresh its position
        cache.insert(&request("one", &[]), answer("uno"));
        cache.insert(&request("three", &[]), answer("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&request("one", &[])).is_none());
        assert_eq!(cache.get(&request("two", &[])).map(|a| a.text.as_str()), Some("2"));
        assert!(cache.get(&request("three", &[])).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
