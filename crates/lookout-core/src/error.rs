use lookout_capture::OcrError;
use lookout_config::ConfigError;
use lookout_types::SessionPhase;

/// A single detector failed on one frame, or could not be built
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("text extraction failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("detector could not be initialized: {0}")]
    Init(String),

    #[error("frame unusable: {0}")]
    Frame(String),
}

/// The platform refused or could not express an input event
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input backend rejected event: {0}")]
    Rejected(String),

    #[error("character {0:?} cannot be typed")]
    UnsupportedChar(char),
}

/// An answer could not be turned into input actions
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlanError {
    #[error("answer is empty")]
    EmptyAnswer,

    #[error("answer '{0}' matches none of the options")]
    NoMatchingOption(String),

    #[error("true/false answer expected, got '{0}'")]
    NotBoolean(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session can only start from idle, current phase is {0}")]
    NotIdle(SessionPhase),

    #[error("reset only leaves halted, current phase is {0}")]
    NotHalted(SessionPhase),

    #[error("safety monitor unavailable: {0}")]
    Safety(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
