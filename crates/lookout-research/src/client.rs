use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lookout_config::research::ResearchConfig;
use lookout_types::{FailureKind, ResearchFailure, ResearchRequest, ResearchResult};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{Answer, AnswerCache, ReasoningService, ResearchError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Per-attempt limit
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            max_attempts: config.max_research_retries.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// Exponential backoff ceiling after the given failed attempt (1-based)
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Ceiling with jitter: uniformly somewhere in its upper half
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        let ceiling_ms = ceiling.as_millis() as u64;
        if ceiling_ms < 2 {
            return ceiling;
        }
        Duration::from_millis(rand::thread_rng().gen_range(ceiling_ms / 2..=ceiling_ms))
    }
}

/// Wraps an ordered chain of reasoning services with bounded retries,
/// an answer cache and cancellation
pub struct ResearchClient {
    services: Vec<Arc<dyn ReasoningService>>,
    policy: RetryPolicy,
    answers: Option<Mutex<AnswerCache>>,
}

impl ResearchClient {
    pub fn new(primary: Arc<dyn ReasoningService>, policy: RetryPolicy) -> Self {
        log_provider(&primary, "primary");
        Self {
            services: vec![primary],
            policy,
            answers: None,
        }
    }

    /// Chain built from configuration; `None` when `services` is empty
    pub fn from_config(config: &ResearchConfig, services: Vec<Arc<dyn ReasoningService>>) -> Option<Self> {
        let mut services = services.into_iter();
        let mut client = Self::new(services.next()?, RetryPolicy::from_config(config));
        for service in services {
            client = client.with_fallback(service);
        }
        if config.answer_cache_size > 0 {
            client = client.with_answer_cache(config.answer_cache_size);
        }
        Some(client)
    }

    /// Consulted after every earlier service has failed
    pub fn with_fallback(mut self, service: Arc<dyn ReasoningService>) -> Self {
        log_provider(&service, "fallback");
        self.services.push(service);
        self
    }

    pub fn with_answer_cache(mut self, capacity: usize) -> Self {
        self.answers = Some(Mutex::new(AnswerCache::new(capacity)));
        self
    }

    pub fn clear_answers(&self) {
        if let Some(answers) = &self.answers
            && let Ok(mut answers) = answers.lock()
        {
            answers.clear();
        }
    }

    fn cached(&self, request: &ResearchRequest) -> Option<Answer> {
        let answers = self.answers.as_ref()?.lock().ok()?;
        answers.get(request).cloned()
    }

    fn remember(&self, request: &ResearchRequest, answer: &Answer) {
        if let Some(answers) = &self.answers
            && let Ok(mut answers) = answers.lock()
        {
            answers.insert(request, answer.clone());
        }
    }

    /// Submit a request, retrying transient failures and falling through
    /// the chain when a service gives up.
    ///
    /// Always returns a result: a cancelled token yields a cancellation result
    /// as soon as it is observed, whether mid-request or mid-backoff. The
    /// failure is terminal only when every service failed terminally.
    pub async fn submit(&self, request: ResearchRequest, cancel: &CancellationToken) -> ResearchResult {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return cancelled(&request, started, 0);
        }

        if let Some(answer) = self.cached(&request) {
            tracing::debug!(request_id = %request.request_id, "answer cache hit");
            return succeeded(&request, answer, started, 0);
        }

        let mut attempts = 0;
        let mut all_terminal = true;
        let mut last_error = String::new();

        for (position, service) in self.services.iter().enumerate() {
            match self.attempt(service.as_ref(), &request, cancel, &mut attempts).await {
                Ok(answer) => {
                    self.remember(&request, &answer);
                    return succeeded(&request, answer, started, attempts);
                }
                Err(None) => return cancelled(&request, started, attempts),
                Err(Some(e)) => {
                    all_terminal &= e.is_terminal();
                    last_error = format!("{}: {}", service.metadata().name, e);
                    if position + 1 < self.services.len() {
                        tracing::warn!(
                            event = "research_fallback",
                            request_id = %request.request_id,
                            "{}, trying next provider", last_error
                        );
                    }
                }
            }
        }

        let kind = if all_terminal {
            FailureKind::Terminal
        } else {
            FailureKind::Transient
        };
        failed(&request, kind, last_error, started, attempts)
    }

    /// One service with retries; `Err(None)` means cancelled
    async fn attempt(
        &self,
        service: &dyn ReasoningService,
        request: &ResearchRequest,
        cancel: &CancellationToken,
        attempts: &mut u32,
    ) -> Result<Answer, Option<ResearchError>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(None);
            }
            *attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(None),
                result = tokio::time::timeout(self.policy.request_timeout, service.answer(request)) => {
                    result.unwrap_or(Err(ResearchError::Timeout))
                }
            };

            match outcome {
                Ok(answer) => {
                    tracing::debug!(
                        request_id = %request.request_id,
                        provider = %service.metadata().name,
                        attempt,
                        "research succeeded"
                    );
                    return Ok(answer);
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        event = "research_retry",
                        request_id = %request.request_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient research failure: {}", e
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(None),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(Some(e)),
            }
        }
    }
}

fn log_provider(service: &Arc<dyn ReasoningService>, role: &str) {
    let metadata = service.metadata();
    tracing::info!(
        provider = %metadata.name,
        model = %metadata.model,
        requires_api_key = metadata.requires_api_key,
        "{} research provider ready", role
    );
}

fn succeeded(request: &ResearchRequest, answer: Answer, started: Instant, attempts: u32) -> ResearchResult {
    ResearchResult {
        request_id: request.request_id,
        answer_text: answer.text,
        confidence: answer.confidence,
        latency: started.elapsed(),
        attempts,
        failure: None,
    }
}

fn failed(
    request: &ResearchRequest,
    kind: FailureKind,
    reason: String,
    started: Instant,
    attempts: u32,
) -> ResearchResult {
    ResearchResult {
        request_id: request.request_id,
        answer_text: String::new(),
        confidence: 0.0,
        latency: started.elapsed(),
        attempts,
        failure: Some(ResearchFailure { kind, reason }),
    }
}

fn cancelled(request: &ResearchRequest, started: Instant, attempts: u32) -> ResearchResult {
    failed(
        request,
        FailureKind::Cancelled,
        "cancelled by emergency stop".to_string(),
        started,
        attempts,
    )
}
