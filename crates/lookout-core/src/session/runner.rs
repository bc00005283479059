use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lookout_capture::{FrameSource, TextExtractor, capture_with_timeout};
use lookout_config::{Config, ConfigError};
use lookout_research::ResearchClient;
use lookout_types::{FailureKind, QuestionCandidate, ResearchRequest, SessionPhase};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::machine::{RunContext, SessionEvent, SessionMachine};
use crate::cache::{Admission, CandidateCache};
use crate::recognition::RecognitionEngine;
use crate::response::{ExecutionOutcome, InputDriver, PlanBuilder, ResponseController};

/// Loop timing and policy knobs
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub context_label: String,
    pub poll_interval: Duration,
    pub capture_timeout: Duration,
    /// Limit on recognizing one frame
    pub recognition_timeout: Duration,
    /// Pause between a finished cycle and the next sample
    pub cooldown: Duration,
    pub max_questions: Option<u32>,
    pub max_consecutive_failures: u32,
    pub min_answer_confidence: f32,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            context_label: config.session.context_label.clone(),
            poll_interval: Duration::from_millis(config.capture.poll_interval_ms),
            capture_timeout: Duration::from_millis(config.capture.timeout_ms),
            recognition_timeout: Duration::from_millis(config.detection.timeout_ms),
            cooldown: Duration::from_millis(config.session.cooldown_ms),
            max_questions: config.session.max_questions,
            max_consecutive_failures: config.session.max_consecutive_failures.max(1),
            min_answer_confidence: config.research.min_answer_confidence,
        }
    }
}

/// Components a session sequences
pub struct SessionParts {
    pub frames: Arc<dyn FrameSource>,
    pub engine: RecognitionEngine,
    pub cache: CandidateCache,
    pub research: ResearchClient,
    pub planner: PlanBuilder,
    pub controller: ResponseController,
}

enum CycleOutcome {
    Answered,
    Skipped,
    TerminalFailure(String),
    /// The run left the cycle: halted, stopped, or superseded
    Ended,
}

/// Drives capture, recognition, research and response for whichever run
/// the machine currently has
pub struct Session {
    machine: Arc<SessionMachine>,
    settings: SessionSettings,
    frames: Arc<dyn FrameSource>,
    engine: Arc<RecognitionEngine>,
    cache: CandidateCache,
    research: Arc<ResearchClient>,
    planner: PlanBuilder,
    controller: Arc<Mutex<ResponseController>>,
}

impl Session {
    pub fn new(machine: Arc<SessionMachine>, settings: SessionSettings, parts: SessionParts) -> Self {
        Self {
            machine,
            settings,
            frames: parts.frames,
            engine: Arc::new(parts.engine),
            cache: parts.cache,
            research: Arc::new(parts.research),
            planner: parts.planner,
            controller: Arc::new(Mutex::new(parts.controller)),
        }
    }

    /// Wire every component from a validated configuration
    pub fn from_config(
        config: &Config,
        frames: Arc<dyn FrameSource>,
        extractor: Option<Arc<dyn TextExtractor>>,
        research: ResearchClient,
        driver: Box<dyn InputDriver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let machine = Arc::new(SessionMachine::new(
            config.session.context_label.clone(),
            Duration::from_secs(config.session.duration_minutes * 60),
        ));

        let parts = SessionParts {
            frames,
            engine: RecognitionEngine::from_config(
                &config.detection,
                &config.session.context_label,
                extractor,
            )?,
            cache: CandidateCache::from_config(&config.cache),
            research,
            planner: PlanBuilder::new(config.response.clone(), None),
            controller: ResponseController::new(
                driver,
                Duration::from_millis(config.response.cancel_poll_ms),
                None,
            ),
        };

        Ok(Self::new(machine, SessionSettings::from_config(config), parts))
    }

    pub fn machine(&self) -> Arc<SessionMachine> {
        self.machine.clone()
    }

    /// Serve runs until `shutdown` fires. Idle and halted phases just wait
    /// for the next snapshot change.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut updates = self.machine.subscribe();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Some(run) = self.machine.monitoring_run() {
                self.drive(&run, &shutdown).await;
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("session runner stopped");
    }

    fn in_phase(&self, run: &RunContext, phase: SessionPhase) -> bool {
        self.machine.current_run().map(|r| r.id) == Some(run.id) && self.machine.phase() == phase
    }

    async fn drive(&mut self, run: &RunContext, shutdown: &CancellationToken) {
        self.cache.clear();
        self.research.clear_answers();

        let mut answered = 0u32;
        let mut terminal_failures = 0u32;
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                _ = run.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(run.deadline) => {
                    self.machine.apply_in(run, SessionEvent::DeadlineReached);
                    return;
                }
                _ = ticker.tick() => {}
            }

            if !self.in_phase(run, SessionPhase::Monitoring) {
                return;
            }

            let Some(candidate) = self.sample(run).await else {
                continue;
            };

            match self.handle_candidate(run, candidate).await {
                CycleOutcome::Ended => return,
                CycleOutcome::Answered => {
                    answered += 1;
                    terminal_failures = 0;
                }
                CycleOutcome::Skipped => {}
                CycleOutcome::TerminalFailure(reason) => {
                    terminal_failures += 1;
                    if terminal_failures >= self.settings.max_consecutive_failures {
                        self.machine.apply_in(
                            run,
                            SessionEvent::Aborted {
                                reason: format!(
                                    "{terminal_failures} consecutive terminal research failures, last: {reason}"
                                ),
                            }
                        );
                        return;
                    }
                }
            }

            // A deferred stop has already turned this boundary into idle
            if !self.in_phase(run, SessionPhase::Cooldown) {
                return;
            }

            if let Some(max) = self.settings.max_questions
                && answered >= max
            {
                tracing::info!(answered, max, "question quota reached");
                self.machine.apply_in(run, SessionEvent::StopRequested);
                return;
            }

            if Instant::now() >= run.deadline {
                self.machine.apply_in(run, SessionEvent::DeadlineReached);
                return;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                _ = run.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(run.deadline) => {
                    self.machine.apply_in(run, SessionEvent::DeadlineReached);
                    return;
                }
                _ = tokio::time::sleep(self.settings.cooldown) => {}
            }

            if self.machine.apply_in(run, SessionEvent::CooldownElapsed) != Some(SessionPhase::Monitoring) {
                return;
            }
            ticker.reset();
        }
    }

    /// Capture, recognize and admit. The frame is dropped once recognition
    /// returns.
    async fn sample(&mut self, run: &RunContext) -> Option<QuestionCandidate> {
        let frame = match capture_with_timeout(self.frames.clone(), self.settings.capture_timeout).await {
            Ok(frame) => {
                self.machine.record_frame(run);
                frame
            }
            Err(e) => {
                tracing::warn!(event = "capture_failed", "{}", e);
                self.machine.apply_in(run, SessionEvent::CaptureFailed);
                return None;
            }
        };

        let engine = self.engine.clone();
        let recognition = tokio::task::spawn_blocking(move || engine.extract_candidates(&frame));
        let candidates = tokio::select! {
            biased;
            _ = run.cancel.cancelled() => return None,
            joined = tokio::time::timeout(self.settings.recognition_timeout, recognition) => match joined {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(e)) => {
                    tracing::error!("recognition task failed: {}", e);
                    return None;
                }
                Err(_) => {
                    tracing::warn!(
                        event = "detector_failed",
                        timeout_ms = self.settings.recognition_timeout.as_millis() as u64,
                        "recognition overran its time limit, frame skipped"
                    );
                    return None;
                }
            },
        };

        if run.cancel.is_cancelled() {
            return None;
        }

        // Detection order; the first admitted candidate wins this frame
        let now = std::time::Instant::now();
        for candidate in candidates {
            match self.cache.admit(&candidate, now) {
                Admission::Suppress => {
                    tracing::debug!(
                        event = "candidate_suppressed",
                        hash = candidate.content_hash,
                        text = %candidate.normalized_text
                    );
                    self.machine.apply_in(run, SessionEvent::CandidateSuppressed);
                }
                Admission::Accept => return Some(candidate),
            }
        }

        None
    }

    async fn handle_candidate(&mut self, run: &RunContext, candidate: QuestionCandidate) -> CycleOutcome {
        tracing::info!(
            event = "candidate_detected",
            source = %candidate.source,
            confidence = candidate.confidence,
            options = candidate.options.len(),
            text = %candidate.extracted_text
        );

        if self.machine.apply_in(run, SessionEvent::CandidateAdmitted) != Some(SessionPhase::CandidateDetected) {
            return CycleOutcome::Ended;
        }

        let request = ResearchRequest::for_candidate(&candidate, &self.settings.context_label);
        let request_id = request.request_id;

        if self.machine.apply_in(run, SessionEvent::ResearchSubmitted) != Some(SessionPhase::Researching) {
            return CycleOutcome::Ended;
        }

        let research = self.research.clone();
        let cancel = run.cancel.clone();
        let result = match tokio::spawn(async move { research.submit(request, &cancel).await }).await {
            Ok(result) => result,
            Err(e) => {
                let reason = format!("research task failed: {e}");
                tracing::error!(event = "research_failed", %request_id, "{}", reason);
                return self.settle(run, SessionEvent::ResearchFailed { reason }, CycleOutcome::Skipped);
            }
        };

        if result.is_cancelled() {
            tracing::warn!(
                event = "response_cancelled",
                %request_id,
                stage = "research",
                attempts = result.attempts
            );
            self.machine.apply_in(run, SessionEvent::ResearchCancelled);
            return CycleOutcome::Ended;
        }

        if let Some(failure) = result.failure {
            tracing::warn!(
                event = "research_failed",
                %request_id,
                kind = ?failure.kind,
                attempts = result.attempts,
                "{}", failure.reason
            );
            let outcome = match failure.kind {
                FailureKind::Terminal => CycleOutcome::TerminalFailure(failure.reason.clone()),
                _ => CycleOutcome::Skipped,
            };
            return self.settle(
                run,
                SessionEvent::ResearchFailed {
                    reason: failure.reason,
                },
                outcome
            );
        }

        if result.confidence < self.settings.min_answer_confidence {
            tracing::info!(
                event = "answer_rejected",
                %request_id,
                confidence = result.confidence,
                floor = self.settings.min_answer_confidence
            );
            return self.settle(run, SessionEvent::AnswerRejected, CycleOutcome::Skipped);
        }

        tracing::info!(
            %request_id,
            attempts = result.attempts,
            latency_ms = result.latency.as_millis() as u64,
            confidence = result.confidence,
            answer = %result.answer_text,
            "research succeeded"
        );

        if self.machine.apply_in(run, SessionEvent::ResearchSucceeded) != Some(SessionPhase::Responding) {
            return CycleOutcome::Ended;
        }

        let plan = match self.planner.build(&candidate, &result.answer_text) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(event = "response_failed", %request_id, "{}", e);
                return self.settle(
                    run,
                    SessionEvent::PlanFailed {
                        reason: e.to_string(),
                    },
                    CycleOutcome::Skipped
                );
            }
        };

        let planned = plan.len();
        let controller = self.controller.clone();
        let cancel = run.cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut controller = controller.lock().unwrap_or_else(PoisonError::into_inner);
            controller.execute(&plan, &cancel)
        })
        .await;

        match outcome {
            Ok(ExecutionOutcome::Completed { actions }) => {
                tracing::info!(event = "response_completed", %request_id, actions);
                self.settle(run, SessionEvent::PlanCompleted, CycleOutcome::Answered)
            }
            Ok(ExecutionOutcome::Cancelled { executed }) => {
                tracing::warn!(
                    event = "response_cancelled",
                    %request_id,
                    stage = "response",
                    executed,
                    planned
                );
                self.machine.apply_in(run, SessionEvent::PlanCancelled);
                CycleOutcome::Ended
            }
            Ok(ExecutionOutcome::Failed { executed, reason }) => {
                tracing::warn!(event = "response_failed", %request_id, executed, planned, "{}", reason);
                self.settle(run, SessionEvent::PlanFailed { reason }, CycleOutcome::Skipped)
            }
            Err(e) => {
                let reason = format!("response task failed: {e}");
                tracing::error!(event = "response_failed", %request_id, "{}", reason);
                self.settle(run, SessionEvent::PlanFailed { reason }, CycleOutcome::Skipped)
            }
        }
    }

    /// Apply the event that ends a cycle; anything but cooldown ends the run
    fn settle(&self, run: &RunContext, event: SessionEvent, outcome: CycleOutcome) -> CycleOutcome {
        match self.machine.apply_in(run, event) {
            Some(SessionPhase::Cooldown) => outcome,
            _ => CycleOutcome::Ended,
        }
    }
}
