use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use lookout_types::{SessionPhase, SessionSnapshot};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SessionError;

/// Everything that can happen to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    CandidateAdmitted,
    CandidateSuppressed,
    CaptureFailed,
    ResearchSubmitted,
    ResearchSucceeded,
    ResearchFailed { reason: String },
    AnswerRejected,
    ResearchCancelled,
    PlanCompleted,
    PlanCancelled,
    PlanFailed { reason: String },
    CooldownElapsed,
    DeadlineReached,
    StopRequested,
    Aborted { reason: String },
    EmergencyStop,
    Reset,
}

/// Transition table. `None` means the event does not apply in that phase.
pub fn next_phase(phase: SessionPhase, event: &SessionEvent) -> Option<SessionPhase> {
    use SessionEvent as E;
    use SessionPhase as P;

    match (phase, event) {
        (_, E::EmergencyStop) => Some(P::Halted),

        (P::Halted, E::Reset) => Some(P::Idle),
        // Late outcomes of the work that was interrupted
        (P::Halted, E::ResearchCancelled | E::PlanCancelled) => Some(P::Halted),
        (P::Halted, _) => None,

        (P::Idle, E::Start) => Some(P::Monitoring),
        (P::Idle, _) => None,

        (P::Monitoring, E::CandidateAdmitted) => Some(P::CandidateDetected),
        (P::Monitoring, E::CandidateSuppressed | E::CaptureFailed) => Some(P::Monitoring),
        (P::CandidateDetected, E::ResearchSubmitted) => Some(P::Researching),
        (P::Researching, E::ResearchSucceeded) => Some(P::Responding),
        (P::Researching, E::ResearchFailed { .. } | E::AnswerRejected) => Some(P::Cooldown),
        (P::Researching, E::ResearchCancelled) => Some(P::Halted),
        (P::Responding, E::PlanCompleted | E::PlanFailed { .. }) => Some(P::Cooldown),
        (P::Responding, E::PlanCancelled) => Some(P::Halted),
        (P::Cooldown, E::CooldownElapsed) => Some(P::Monitoring),
        (P::Monitoring | P::Cooldown, E::DeadlineReached | E::StopRequested) => Some(P::Idle),
        (_, E::Aborted { .. }) => Some(P::Idle),

        _ => None,
    }
}

/// Total form of the table: unlisted pairs keep the current phase
pub fn transition(phase: SessionPhase, event: &SessionEvent) -> SessionPhase {
    next_phase(phase, event).unwrap_or(phase)
}

/// Handle on one started run. Its token is the cancellation flag every
/// suspension point of that run observes.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub id: Uuid,
    pub cancel: CancellationToken,
    pub deadline: Instant,
}

struct Inner {
    snapshot: SessionSnapshot,
    run: Option<RunContext>,
    stop_pending: bool,
}

/// The single owner of session state. Every mutation goes through one
/// mutex-guarded transition; observers get snapshots over a watch channel.
pub struct SessionMachine {
    inner: Mutex<Inner>,
    updates: watch::Sender<SessionSnapshot>,
    duration: Duration,
}

impl SessionMachine {
    pub fn new(context_label: impl Into<String>, duration: Duration) -> Self {
        let snapshot = SessionSnapshot::idle(context_label);
        let (updates, _) = watch::channel(snapshot.clone());
        Self {
            inner: Mutex::new(Inner {
                snapshot,
                run: None,
                stop_pending: false,
            }),
            updates,
            duration,
        }
    }

    // A poisoned lock must never block an emergency stop
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().snapshot.phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn current_run(&self) -> Option<RunContext> {
        self.lock().run.clone()
    }

    /// The active run, only while it is sampling
    pub fn monitoring_run(&self) -> Option<RunContext> {
        let inner = self.lock();
        match inner.snapshot.phase {
            SessionPhase::Monitoring => inner.run.clone(),
            _ => None,
        }
    }

    pub fn start(&self) -> Result<RunContext, SessionError> {
        let mut inner = self.lock();
        let phase = inner.snapshot.phase;
        if phase != SessionPhase::Idle {
            return Err(SessionError::NotIdle(phase));
        }
        self.step(&mut inner, SessionEvent::Start);
        inner.run.clone().ok_or(SessionError::NotIdle(phase))
    }

    /// Graceful stop. While a candidate is in flight the stop is deferred
    /// to the next cooldown boundary; nothing is cancelled.
    pub fn stop(&self) -> SessionPhase {
        let mut inner = self.lock();
        let phase = inner.snapshot.phase;
        if phase.is_in_flight() {
            inner.stop_pending = true;
            tracing::info!(phase = %phase, "stop deferred until the current candidate resolves");
            return phase;
        }
        self.step(&mut inner, SessionEvent::StopRequested)
            .unwrap_or(phase)
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        match inner.snapshot.phase {
            SessionPhase::Halted => {
                self.step(&mut inner, SessionEvent::Reset);
                Ok(())
            }
            SessionPhase::Idle => Ok(()),
            phase => Err(SessionError::NotHalted(phase)),
        }
    }

    /// Callable from any thread; never waits on in-flight work
    pub fn emergency_stop(&self) -> SessionPhase {
        let mut inner = self.lock();
        self.step(&mut inner, SessionEvent::EmergencyStop)
            .unwrap_or(SessionPhase::Halted)
    }

    /// Apply an event on behalf of `run`; ignored once that run is over
    pub fn apply_in(&self, run: &RunContext, event: SessionEvent) -> Option<SessionPhase> {
        let mut inner = self.lock();
        if inner.run.as_ref().map(|r| r.id) != Some(run.id) {
            tracing::debug!(run_id = %run.id, ?event, "event from a finished run ignored");
            return None;
        }
        self.step(&mut inner, event)
    }

    pub fn record_frame(&self, run: &RunContext) {
        let mut inner = self.lock();
        if inner.run.as_ref().map(|r| r.id) == Some(run.id) {
            inner.snapshot.stats.frames_captured += 1;
            self.updates.send_replace(inner.snapshot.clone());
        }
    }

    fn step(&self, inner: &mut Inner, event: SessionEvent) -> Option<SessionPhase> {
        let from = inner.snapshot.phase;
        let to = next_phase(from, &event)?;
        inner.snapshot.phase = to;
        self.on_transition(inner, from, to, event);

        if to == SessionPhase::Cooldown && inner.stop_pending {
            inner.stop_pending = false;
            return self.step(inner, SessionEvent::StopRequested);
        }

        self.updates.send_replace(inner.snapshot.clone());
        Some(to)
    }

    fn on_transition(&self, inner: &mut Inner, from: SessionPhase, to: SessionPhase, event: SessionEvent) {
        let stats = &mut inner.snapshot.stats;
        match event {
            SessionEvent::Start => {
                let run = RunContext {
                    id: Uuid::new_v4(),
                    cancel: CancellationToken::new(),
                    deadline: Instant::now() + self.duration,
                };
                let started = SystemTime::now();
                inner.snapshot.run_id = Some(run.id);
                inner.snapshot.started_at = Some(started);
                inner.snapshot.deadline_at = Some(started + self.duration);
                inner.snapshot.stats = Default::default();
                inner.snapshot.last_failure = None;
                inner.stop_pending = false;
                tracing::info!(
                    event = "session_started",
                    run_id = %run.id,
                    context = %inner.snapshot.context_label,
                    duration_secs = self.duration.as_secs(),
                    "session started"
                );
                inner.run = Some(run);
            }
            SessionEvent::CandidateAdmitted => stats.candidates_detected += 1,
            SessionEvent::CandidateSuppressed => stats.suppressed += 1,
            SessionEvent::CaptureFailed => stats.capture_failures += 1,
            SessionEvent::ResearchSubmitted => stats.research_requests += 1,
            SessionEvent::ResearchFailed { reason } => {
                stats.research_failures += 1;
                inner.snapshot.last_failure = Some(reason);
            }
            SessionEvent::AnswerRejected => stats.answers_rejected += 1,
            SessionEvent::PlanCompleted => stats.answered += 1,
            SessionEvent::PlanCancelled => stats.responses_cancelled += 1,
            SessionEvent::PlanFailed { reason } => inner.snapshot.last_failure = Some(reason),
            SessionEvent::DeadlineReached | SessionEvent::StopRequested => {
                tracing::info!(
                    event = "session_finished",
                    reason = ?event,
                    answered = inner.snapshot.stats.answered,
                    "session finished"
                );
                inner.run = None;
                inner.stop_pending = false;
            }
            SessionEvent::Aborted { reason } => {
                tracing::warn!(event = "session_aborted", from = %from, "{}", reason);
                inner.snapshot.last_failure = Some(reason);
                inner.run = None;
                inner.stop_pending = false;
            }
            SessionEvent::EmergencyStop => {
                tracing::warn!(event = "emergency_stop_triggered", from = %from, "emergency stop");
                inner.snapshot.last_failure = Some("emergency stop".to_string());
            }
            SessionEvent::Reset => {
                inner.run = None;
                inner.stop_pending = false;
                inner.snapshot.run_id = None;
                inner.snapshot.started_at = None;
                inner.snapshot.deadline_at = None;
                inner.snapshot.last_failure = None;
            }
            SessionEvent::ResearchSucceeded
            | SessionEvent::ResearchCancelled
            | SessionEvent::CooldownElapsed => {}
        }

        if to == SessionPhase::Halted {
            inner.stop_pending = false;
            if let Some(run) = &inner.run {
                run.cancel.cancel();
            }
        }
    }
}
