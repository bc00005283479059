//! Scripted stand-ins for the screen, the reasoning service and the input device

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lookout_capture::{CaptureError, FrameSource};
use lookout_config::response::ResponseConfig;
use lookout_research::{Answer, ProviderMetadata, ReasoningService, ResearchClient, ResearchError, RetryPolicy};
use lookout_types::{
    AnswerOption, CaptureRegion, FrameSnapshot, InputAction, MouseButton, ResearchRequest, SessionSnapshot,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::cache::CandidateCache;
use crate::error::{DetectorError, InputError};
use crate::recognition::{Detection, Detector, RecognitionEngine};
use crate::response::{InputDriver, PlanBuilder, ResponseController};
use crate::session::{Session, SessionMachine, SessionParts, SessionSettings};

pub const SCREEN: CaptureRegion = CaptureRegion {
    x: 100,
    y: 100,
    width: 640,
    height: 480,
};

/// Yields `frames` identical frames, then fails every capture
pub struct ScriptedFrames {
    remaining: AtomicUsize,
}

impl ScriptedFrames {
    pub fn new(frames: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(frames),
        }
    }
}

impl FrameSource for ScriptedFrames {
    fn capture(&self) -> Result<FrameSnapshot, CaptureError> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| CaptureError::Backend("screen locked".into()))?;
        Ok(FrameSnapshot::new(vec![0; 4 * 4 * 4], 4, 4, SCREEN))
    }

    fn region(&self) -> CaptureRegion {
        SCREEN
    }
}

/// Sees one multiple-choice question in every frame. With `vary` set the
/// wording changes per frame so nothing is ever a repeat. With `stall_first`
/// set the first frame blocks for that long, like a wedged OCR backend.
pub struct FakeDetector {
    vary: bool,
    stall_first: Option<Duration>,
    seen: AtomicUsize,
}

impl FakeDetector {
    pub fn new(vary: bool) -> Self {
        Self {
            vary,
            stall_first: None,
            seen: AtomicUsize::new(0),
        }
    }

    pub fn stalling(mut self, stall: Option<Duration>) -> Self {
        self.stall_first = stall;
        self
    }
}

impl Detector for FakeDetector {
    fn name(&self) -> &str {
        "fake"
    }

    fn detect(&self, _frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        if n == 0
            && let Some(stall) = self.stall_first
        {
            std::thread::sleep(stall);
        }
        let text = if self.vary {
            format!("Question {n}: which city is the capital of Spain?")
        } else {
            "Which city is the capital of Spain?".to_string()
        };

        Ok(vec![Detection {
            text,
            region: CaptureRegion::new(10, 10, 300, 30),
            confidence: 0.9,
            options: vec![
                AnswerOption {
                    label: "A".into(),
                    text: "Paris".into(),
                    region: CaptureRegion::new(10, 50, 100, 20),
                },
                AnswerOption {
                    label: "B".into(),
                    text: "Madrid".into(),
                    region: CaptureRegion::new(10, 80, 100, 20),
                },
            ],
        }])
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str, f32),
    Slow(Duration, &'static str),
    Timeout,
    Reject,
    Hang,
}

/// Plays back `steps`, then repeats `fallback` forever
pub struct ScriptedService {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedService {
    pub fn new(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most requests ever in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ReasoningService for ScriptedService {
    async fn answer(&self, _request: &ResearchRequest) -> Result<Answer, ResearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.active);

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Reply(text, confidence) => Ok(Answer {
                text: text.into(),
                confidence,
            }),
            Step::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(Answer {
                    text: text.into(),
                    confidence: 0.9,
                })
            }
            Step::Timeout => Err(ResearchError::Timeout),
            Step::Reject => Err(ResearchError::Authentication),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ResearchError::Timeout)
            }
        }
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "scripted".into(),
            model: "test".into(),
            requires_api_key: false,
        }
    }
}

/// Records every emitted action; optionally pulls the abort signal after
/// the n-th one
pub struct RecordingDriver {
    actions: Arc<Mutex<Vec<InputAction>>>,
    halt_after: Option<(usize, Arc<SessionMachine>)>,
}

impl InputDriver for RecordingDriver {
    fn perform(&mut self, action: &InputAction) -> Result<(), InputError> {
        let count = {
            let mut actions = self.actions.lock().unwrap();
            actions.push(action.clone());
            actions.len()
        };
        if let Some((n, machine)) = &self.halt_after
            && count == *n
        {
            machine.emergency_stop();
        }
        Ok(())
    }
}

pub struct RigOptions {
    pub frames: usize,
    pub vary: bool,
    pub steps: Vec<Step>,
    pub fallback: Step,
    pub settings: SessionSettings,
    pub duration: Duration,
    pub path_points: usize,
    pub halt_after: Option<usize>,
    pub request_timeout: Duration,
    pub stall_first: Option<Duration>,
    pub answer_cache: Option<usize>,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            frames: usize::MAX,
            vary: false,
            steps: Vec::new(),
            fallback: Step::Reply("B", 0.9),
            settings: SessionSettings {
                context_label: "Geography quiz".into(),
                poll_interval: Duration::from_millis(5),
                capture_timeout: Duration::from_millis(500),
                recognition_timeout: Duration::from_secs(1),
                cooldown: Duration::from_millis(5),
                max_questions: None,
                max_consecutive_failures: 3,
                min_answer_confidence: 0.0,
            },
            duration: Duration::from_secs(60),
            path_points: 4,
            halt_after: None,
            request_timeout: Duration::from_secs(1),
            stall_first: None,
            answer_cache: None,
        }
    }
}

pub struct Rig {
    pub machine: Arc<SessionMachine>,
    session: Option<Session>,
    pub service: Arc<ScriptedService>,
    pub actions: Arc<Mutex<Vec<InputAction>>>,
}

impl Rig {
    pub fn new(options: RigOptions) -> Self {
        let machine = Arc::new(SessionMachine::new(
            options.settings.context_label.clone(),
            options.duration,
        ));
        let service = ScriptedService::new(options.steps, options.fallback);
        let actions = Arc::new(Mutex::new(Vec::new()));

        let driver = RecordingDriver {
            actions: actions.clone(),
            halt_after: options.halt_after.map(|n| (n, machine.clone())),
        };

        let response = ResponseConfig {
            path_points: options.path_points,
            ..ResponseConfig::instant()
        };

        let mut research = ResearchClient::new(
            service.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                request_timeout: options.request_timeout,
            },
        );
        if let Some(capacity) = options.answer_cache {
            research = research.with_answer_cache(capacity);
        }

        let parts = SessionParts {
            frames: Arc::new(ScriptedFrames::new(options.frames)),
            engine: RecognitionEngine::new(
                vec![Box::new(FakeDetector::new(options.vary).stalling(options.stall_first)) as Box<dyn Detector>],
                0.5,
                40,
            )
            .unwrap(),
            cache: CandidateCache::new(Duration::from_secs(30), Duration::from_secs(300)),
            research,
            planner: PlanBuilder::new(response, Some(7)),
            controller: ResponseController::new(Box::new(driver), Duration::from_millis(1), Some(7)),
        };

        Self {
            session: Some(Session::new(machine.clone(), options.settings, parts)),
            machine,
            service,
            actions,
        }
    }

    /// Hand the session to its runner task
    pub fn launch(&mut self) -> Runner {
        let shutdown = CancellationToken::new();
        let session = self.session.take().expect("session already launched");
        Runner {
            handle: tokio::spawn(session.run(shutdown.clone())),
            shutdown,
        }
    }

    pub fn actions(&self) -> Vec<InputAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, InputAction::Click { button: MouseButton::Left }))
            .count()
    }
}

pub struct Runner {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl Runner {
    pub async fn finish(self) {
        self.shutdown.cancel();
        timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("runner did not stop")
            .unwrap();
    }
}

/// Wait until a published snapshot satisfies `pred`
pub async fn wait_for(
    machine: &SessionMachine,
    what: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut updates = machine.subscribe();
    let waited = timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = updates.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            updates.changed().await.expect("machine dropped");
        }
    })
    .await;

    match waited {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for {what}: {:?}", machine.snapshot()),
    }
}
