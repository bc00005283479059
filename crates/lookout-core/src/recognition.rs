use std::sync::Arc;

use lookout_capture::TextExtractor;
use lookout_config::ConfigError;
use lookout_config::detection::{DetectionConfig, DetectorConfig};
use lookout_types::{AnswerOption, CaptureRegion, FrameSnapshot, QuestionCandidate};

use crate::detectors::{HeuristicTextDetector, TemplateDetector, TextHeuristics};
use crate::error::DetectorError;
use crate::normalize::{content_hash, normalize_text, text_hash};

/// Raw detector output, in frame-local coordinates
#[derive(Debug, Clone)]
pub struct Detection {
    pub text: String,
    pub region: CaptureRegion,
    pub confidence: f32,
    pub options: Vec<AnswerOption>,
}

/// Capability every recognition backend implements
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError>;
}

/// Runs detectors in priority order over one frame and merges their output
pub struct RecognitionEngine {
    detectors: Vec<Box<dyn Detector>>,
    confidence_floor: f32,
    region_grid_px: u32,
}

struct Ranked {
    priority: usize,
    index: usize,
    candidate: QuestionCandidate,
}

impl RecognitionEngine {
    pub fn new(
        detectors: Vec<Box<dyn Detector>>,
        confidence_floor: f32,
        region_grid_px: u32,
    ) -> Result<Self, ConfigError> {
        if detectors.is_empty() {
            return Err(ConfigError::NoUsableDetectors);
        }
        Ok(Self {
            detectors,
            confidence_floor,
            region_grid_px,
        })
    }

    /// Build the configured detectors. Individual failures are logged and
    /// skipped; only a list where nothing initializes is an error.
    pub fn from_config(
        config: &DetectionConfig,
        context_label: &str,
        extractor: Option<Arc<dyn TextExtractor>>,
    ) -> Result<Self, ConfigError> {
        if config.detectors.is_empty() {
            return Err(ConfigError::NoDetectors);
        }

        let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
        for entry in &config.detectors {
            match entry {
                DetectorConfig::HeuristicText => match &extractor {
                    Some(extractor) => {
                        let heuristics = TextHeuristics::from_config(config, context_label);
                        detectors.push(Box::new(HeuristicTextDetector::new(
                            extractor.clone(),
                            heuristics,
                        )));
                    }
                    None => {
                        tracing::warn!(
                            event = "detector_failed",
                            detector = "heuristic_text",
                            "no text extractor available, detector disabled"
                        );
                    }
                },
                DetectorConfig::Template {
                    path,
                    label,
                    threshold,
                } => match TemplateDetector::load(path, label, *threshold) {
                    Ok(detector) => detectors.push(Box::new(detector)),
                    Err(e) => {
                        tracing::warn!(
                            event = "detector_failed",
                            detector = "template",
                            path = %path,
                            "{}", e
                        );
                    }
                },
            }
        }

        tracing::info!(
            count = detectors.len(),
            names = ?detectors.iter().map(|d| d.name().to_string()).collect::<Vec<_>>(),
            "recognition engine ready"
        );

        Self::new(detectors, config.confidence_floor, config.region_grid_px)
    }

    /// Never fails: a detector that errors contributes nothing for this frame
    pub fn extract_candidates(&self, frame: &FrameSnapshot) -> Vec<QuestionCandidate> {
        let mut pool = Vec::new();

        for (priority, detector) in self.detectors.iter().enumerate() {
            let detections = match detector.detect(frame) {
                Ok(detections) => detections,
                Err(e) => {
                    tracing::warn!(
                        event = "detector_failed",
                        detector = detector.name(),
                        "{}", e
                    );
                    continue;
                }
            };

            for (index, detection) in detections.into_iter().enumerate() {
                if detection.confidence < self.confidence_floor {
                    tracing::trace!(
                        detector = detector.name(),
                        confidence = detection.confidence,
                        "below confidence floor"
                    );
                    continue;
                }
                if let Some(candidate) = self.build_candidate(detector.name(), detection, frame) {
                    pool.push(Ranked {
                        priority,
                        index,
                        candidate,
                    });
                }
            }
        }

        // Highest confidence first; earlier detector wins ties
        pool.sort_by(|a, b| {
            b.candidate
                .confidence
                .total_cmp(&a.candidate.confidence)
                .then(a.priority.cmp(&b.priority))
                .then(a.index.cmp(&b.index))
        });

        let mut kept: Vec<Ranked> = Vec::new();
        for ranked in pool {
            let region = ranked.candidate.bounding_region;
            if kept
                .iter()
                .all(|k| !k.candidate.bounding_region.overlaps(&region))
            {
                kept.push(ranked);
            }
        }

        kept.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.index.cmp(&b.index)));
        kept.into_iter().map(|r| r.candidate).collect()
    }

    fn build_candidate(
        &self,
        source: &str,
        detection: Detection,
        frame: &FrameSnapshot,
    ) -> Option<QuestionCandidate> {
        let normalized = normalize_text(&detection.text);
        if normalized.is_empty() {
            return None;
        }

        let region = detection.region.offset_by(&frame.region);
        let options = detection
            .options
            .into_iter()
            .map(|o| AnswerOption {
                region: o.region.offset_by(&frame.region),
                ..o
            })
            .collect();

        Some(QuestionCandidate {
            content_hash: content_hash(&normalized, &region, self.region_grid_px),
            text_hash: text_hash(&normalized),
            extracted_text: detection.text.trim().to_string(),
            normalized_text: normalized,
            bounding_region: region,
            options,
            confidence: detection.confidence.clamp(0.0, 1.0),
            source: source.to_string(),
            timestamp: frame.captured_at,
        })
    }
}
