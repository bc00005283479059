use serde::{Deserialize, Serialize};

fn default_confidence_floor() -> f32 {
    0.5
}

fn default_min_question_length() -> usize {
    10
}

fn default_max_question_length() -> usize {
    500
}

fn default_region_grid_px() -> u32 {
    64
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_template_threshold() -> f32 {
    0.8
}

fn default_detectors() -> Vec<DetectorConfig> {
    vec![DetectorConfig::HeuristicText]
}

fn default_ocr_binary() -> String {
    "tesseract".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

/// One entry of the detector priority list; earlier entries win ties
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Scores OCR lines for question-likeness
    HeuristicText,
    /// Matches a reference image inside the frame
    Template {
        path: String,
        label: String,
        #[serde(default = "default_template_threshold")]
        threshold: f32,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OcrBackendConfig {
    #[serde(default = "default_ocr_binary")]
    pub binary: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

impl Default for OcrBackendConfig {
    fn default() -> Self {
        Self {
            binary: default_ocr_binary(),
            language: default_ocr_language(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
    #[serde(default = "default_min_question_length")]
    pub min_question_length: usize,
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,
    /// Regions are snapped to this grid before hashing so OCR box jitter
    /// does not produce a new dedup key
    #[serde(default = "default_region_grid_px")]
    pub region_grid_px: u32,
    #[serde(default = "default_detectors")]
    pub detectors: Vec<DetectorConfig>,
    /// Limit on recognizing one frame; an overrun skips the frame and the
    /// OCR child process is killed
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub ocr: OcrBackendConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            min_question_length: default_min_question_length(),
            max_question_length: default_max_question_length(),
            region_grid_px: default_region_grid_px(),
            detectors: default_detectors(),
            timeout_ms: default_timeout_ms(),
            ocr: OcrBackendConfig::default(),
        }
    }
}
