use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    /// Click an option when the question has two or more, otherwise type
    #[default]
    Auto,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// Inclusive millisecond range
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MsRange {
    pub min: u64,
    pub max: u64,
}

impl MsRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

fn default_think_delay() -> MsRange {
    MsRange::new(500, 2000)
}

fn default_move_duration() -> MsRange {
    MsRange::new(300, 800)
}

fn default_click_delay() -> MsRange {
    MsRange::new(50, 150)
}

fn default_typing_delay() -> MsRange {
    MsRange::new(50, 150)
}

fn default_click_jitter_px() -> i32 {
    5
}

fn default_curve_deviation_px() -> i32 {
    50
}

fn default_path_points() -> usize {
    10
}

fn default_answer_field_offset_px() -> i32 {
    50
}

fn default_cancel_poll_ms() -> u64 {
    10
}

fn default_typo_probability() -> f64 {
    0.02
}

fn default_overshoot_probability() -> f64 {
    0.15
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ResponseConfig {
    pub answer_style: AnswerStyle,
    /// Pause before the first action of a plan
    #[serde(default = "default_think_delay")]
    pub think_delay_ms: MsRange,
    /// Total time for one pointer movement, spread over the path points
    #[serde(default = "default_move_duration")]
    pub move_duration_ms: MsRange,
    #[serde(default = "default_click_delay")]
    pub click_delay_ms: MsRange,
    /// Per character; spaces and punctuation are stretched
    #[serde(default = "default_typing_delay")]
    pub typing_delay_ms: MsRange,
    #[serde(default = "default_click_jitter_px")]
    pub click_jitter_px: i32,
    #[serde(default = "default_curve_deviation_px")]
    pub curve_deviation_px: i32,
    #[serde(default = "default_path_points")]
    pub path_points: usize,
    /// Distance below the question where the free-text field is expected
    #[serde(default = "default_answer_field_offset_px")]
    pub answer_field_offset_px: i32,
    /// Granularity of cancellation checks while pausing
    #[serde(default = "default_cancel_poll_ms")]
    pub cancel_poll_ms: u64,
    /// Chance per letter of typing a wrong one and erasing it
    #[serde(default = "default_typo_probability")]
    pub typo_probability: f64,
    /// Chance per click of moving past the target and coming back
    #[serde(default = "default_overshoot_probability")]
    pub overshoot_probability: f64,
}

impl ResponseConfig {
    /// Every delay set to zero and no typos or overshoot; useful for tests
    /// and dry runs
    pub fn instant() -> Self {
        Self {
            think_delay_ms: MsRange::new(0, 0),
            move_duration_ms: MsRange::new(0, 0),
            click_delay_ms: MsRange::new(0, 0),
            typing_delay_ms: MsRange::new(0, 0),
            cancel_poll_ms: 1,
            typo_probability: 0.0,
            overshoot_probability: 0.0,
            ..Self::default()
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            answer_style: AnswerStyle::default(),
            think_delay_ms: default_think_delay(),
            move_duration_ms: default_move_duration(),
            click_delay_ms: default_click_delay(),
            typing_delay_ms: default_typing_delay(),
            click_jitter_px: default_click_jitter_px(),
            curve_deviation_px: default_curve_deviation_px(),
            path_points: default_path_points(),
            answer_field_offset_px: default_answer_field_offset_px(),
            cancel_poll_ms: default_cancel_poll_ms(),
            typo_probability: default_typo_probability(),
            overshoot_probability: default_overshoot_probability(),
        }
    }
}
