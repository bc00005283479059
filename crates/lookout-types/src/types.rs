use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    /// True when the two rectangles share at least one pixel
    pub fn overlaps(&self, other: &CaptureRegion) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest region containing both
    pub fn union(&self, other: &CaptureRegion) -> CaptureRegion {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        CaptureRegion {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }

    /// Translate a frame-local region into screen coordinates
    pub fn offset_by(&self, origin: &CaptureRegion) -> CaptureRegion {
        CaptureRegion {
            x: self.x + origin.x,
            y: self.y + origin.y,
            ..*self
        }
    }
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self::new(0, 0, 800, 600)
    }
}

/// One captured frame. Lives in memory only and is dropped after recognition.
#[derive(Clone)]
pub struct FrameSnapshot {
    /// Tightly packed RGBA8 pixels, row-major
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Screen region the pixels were taken from
    pub region: CaptureRegion,
    pub captured_at: Instant,
}

impl FrameSnapshot {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, region: CaptureRegion) -> Self {
        Self {
            pixels,
            width,
            height,
            region,
            captured_at: Instant::now(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSnapshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("region", &self.region)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Leading marker as printed on screen ("A", "2", "True")
    pub label: String,
    pub text: String,
    pub region: CaptureRegion,
}

#[derive(Debug, Clone)]
pub struct QuestionCandidate {
    /// Dedup key: hash of normalized text plus coarse region
    pub content_hash: u64,
    /// Hash of the normalized text alone
    pub text_hash: u64,
    pub extracted_text: String,
    pub normalized_text: String,
    pub bounding_region: CaptureRegion,
    pub options: Vec<AnswerOption>,
    pub confidence: f32,
    /// Name of the detector that produced it
    pub source: String,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub request_id: Uuid,
    pub question_text: String,
    pub context_hint: String,
    pub options: Vec<String>,
}

impl ResearchRequest {
    pub fn new(question_text: impl Into<String>, context_hint: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            question_text: question_text.into(),
            context_hint: context_hint.into(),
            options: Vec::new(),
        }
    }

    pub fn for_candidate(candidate: &QuestionCandidate, context_hint: &str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            question_text: candidate.extracted_text.clone(),
            context_hint: context_hint.to_string(),
            options: candidate
                .options
                .iter()
                .map(|o| format!("{}) {}", o.label, o.text))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Retries were exhausted on network/timeout style errors
    Transient,
    /// Authentication or request validation rejected; never retried
    Terminal,
    /// The session was halted while the request was in flight
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchFailure {
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ResearchResult {
    pub request_id: Uuid,
    pub answer_text: String,
    pub confidence: f32,
    pub latency: Duration,
    pub attempts: u32,
    pub failure: Option<ResearchFailure>,
}

impl ResearchResult {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.failure,
            Some(ResearchFailure {
                kind: FailureKind::Cancelled,
                ..
            })
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    Control,
    Shift,
    Alt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Space,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputAction {
    MoveTo { x: i32, y: i32 },
    Click { button: MouseButton },
    KeyPress { key: Key, modifiers: Vec<Modifier> },
    TypeChar(char),
    /// Pure pause; the delay bounds carry the duration
    Wait,
}

/// Randomized pause bounds in milliseconds, applied before an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelayBounds {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayBounds {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    pub fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            (self.min_ms as f64 * factor) as u64,
            (self.max_ms as f64 * factor) as u64,
        )
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: InputAction,
    pub delay: DelayBounds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    pub actions: Vec<PlannedAction>,
}

impl ResponsePlan {
    pub fn push(&mut self, action: InputAction, delay: DelayBounds) {
        self.actions.push(PlannedAction { action, delay });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Monitoring,
    CandidateDetected,
    Researching,
    Responding,
    Cooldown,
    Halted,
}

impl SessionPhase {
    /// A candidate is being researched or responded to
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SessionPhase::CandidateDetected | SessionPhase::Researching | SessionPhase::Responding
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Monitoring => "monitoring",
            SessionPhase::CandidateDetected => "candidate-detected",
            SessionPhase::Researching => "researching",
            SessionPhase::Responding => "responding",
            SessionPhase::Cooldown => "cooldown",
            SessionPhase::Halted => "halted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub candidates_detected: u64,
    pub suppressed: u64,
    pub research_requests: u64,
    pub research_failures: u64,
    pub answers_rejected: u64,
    pub answered: u64,
    pub responses_cancelled: u64,
}

/// Read-only copy of the session state handed to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub context_label: String,
    pub run_id: Option<Uuid>,
    pub started_at: Option<SystemTime>,
    pub deadline_at: Option<SystemTime>,
    pub stats: SessionStats,
    pub last_failure: Option<String>,
}

impl SessionSnapshot {
    pub fn idle(context_label: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            context_label: context_label.into(),
            run_id: None,
            started_at: None,
            deadline_at: None,
            stats: SessionStats::default(),
            last_failure: None,
        }
    }
}

/// Calls the control surface (tray, console) makes on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    Start,
    Stop,
    Reset,
    EmergencyStop,
    Status,
    Quit,
}
