use std::sync::Arc;

use lookout_capture::{TextExtractor, TextLine};
use lookout_config::detection::DetectionConfig;
use lookout_types::{AnswerOption, CaptureRegion, FrameSnapshot};

use crate::error::DetectorError;
use crate::recognition::{Detection, Detector};

const INTERROGATIVES: &[&str] = &[
    "what", "when", "where", "who", "whom", "whose", "which", "how", "why",
];

const STOP_WORDS: &[&str] = &["the", "and", "for", "with", "from", "that", "this"];

const TIMER_CUES: &[&str] = &["time:", "timer", "remaining", "seconds left", "time left"];

/// Lines further apart than this start a new text block
const LINE_GAP_PX: i32 = 20;

/// Scoring knobs for question-likeness
#[derive(Debug, Clone)]
pub struct TextHeuristics {
    pub min_length: usize,
    pub max_length: usize,
    pub context_keywords: Vec<String>,
}

impl TextHeuristics {
    pub fn from_config(config: &DetectionConfig, context_label: &str) -> Self {
        Self {
            min_length: config.min_question_length,
            max_length: config.max_question_length,
            context_keywords: context_keywords(context_label),
        }
    }

    /// Additive score capped at 1.0
    pub fn score(&self, question: &str, option_count: usize, screen_cue: bool) -> f32 {
        let lower = question.to_lowercase();
        let mut score = 0.0;

        if question.contains('?') {
            score += 0.3;
        }
        if option_count >= 2 {
            score += 0.3;
        }
        if screen_cue {
            score += 0.2;
        }
        if self
            .context_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()))
        {
            score += 0.1;
        }
        if lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| INTERROGATIVES.contains(&word))
        {
            score += 0.1;
        }

        f32::min(score, 1.0)
    }

    fn accepts_length(&self, text: &str) -> bool {
        let len = text.chars().count();
        len >= self.min_length && len <= self.max_length
    }
}

fn context_keywords(label: &str) -> Vec<String> {
    label
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Parse an answer-option line such as `A) Paris`, `b. Rome`, `3: Oslo`
/// or a bare `True`/`False`. Returns `(label, text)`.
pub fn parse_option(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    let lower = trimmed.to_lowercase();
    if lower == "true" || lower == "false" {
        let word = if lower == "true" { "True" } else { "False" };
        return Some((word.to_string(), word.to_string()));
    }

    let first = trimmed.chars().next()?;
    let label_len = if first.is_ascii_alphabetic() {
        if !('a'..='h').contains(&first.to_ascii_lowercase()) {
            return None;
        }
        1
    } else if first.is_ascii_digit() {
        let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
        if digits > 2 {
            return None;
        }
        digits
    } else {
        return None;
    };

    let rest = &trimmed[label_len..];
    if !rest.starts_with([')', '.', ':']) {
        return None;
    }

    // `2.5 apples` or `a.m.` are not option markers
    let body = &rest[1..];
    if !body.starts_with(char::is_whitespace) {
        return None;
    }
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    Some((trimmed[..label_len].to_ascii_uppercase(), body.to_string()))
}

fn has_clock(text: &str) -> bool {
    text.as_bytes().windows(4).any(|w| {
        w[0].is_ascii_digit() && w[1] == b':' && w[2].is_ascii_digit() && w[3].is_ascii_digit()
    })
}

/// Timer or progress indicator ("Question 3 of 10", "Time left 0:25")
fn is_cue_line(text: &str) -> bool {
    let lower = text.to_lowercase();
    if TIMER_CUES.iter().any(|c| lower.contains(c)) || has_clock(&lower) {
        return true;
    }
    if lower.contains("progress") || lower.contains("score") {
        return true;
    }
    lower.contains("question") && (lower.contains(" of ") || lower.contains('/'))
}

fn is_question_line(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    // Q3: / Q12.
    let mut chars = text.chars();
    matches!(chars.next(), Some('q' | 'Q'))
        && chars
            .by_ref()
            .take_while(|c| c.is_ascii_digit())
            .count()
            > 0
        && text
            .trim_start_matches(['q', 'Q'])
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .starts_with([':', '.'])
}

struct Pending {
    text: String,
    region: CaptureRegion,
    options: Vec<AnswerOption>,
}

/// Question-likeness scoring over lines from a text extractor
pub struct HeuristicTextDetector {
    extractor: Arc<dyn TextExtractor>,
    heuristics: TextHeuristics,
}

impl HeuristicTextDetector {
    pub fn new(extractor: Arc<dyn TextExtractor>, heuristics: TextHeuristics) -> Self {
        Self {
            extractor,
            heuristics,
        }
    }

    /// Group lines into question blocks followed by their option lines
    pub fn detect_lines(&self, lines: &[TextLine]) -> Vec<Detection> {
        let screen_cue = lines.iter().any(|l| is_cue_line(&l.text));
        let mut detections = Vec::new();
        let mut block: Vec<&TextLine> = Vec::new();
        let mut pending: Option<Pending> = None;

        for line in lines {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }

            if let Some((label, body)) = parse_option(text) {
                if let Some(question) = pending.as_mut() {
                    question.options.push(AnswerOption {
                        label,
                        text: body,
                        region: line.region,
                    });
                }
                block.clear();
                continue;
            }

            if let Some(question) = pending.take() {
                detections.extend(self.finish(question, screen_cue));
            }

            if !text.contains('?') && is_cue_line(text) {
                block.clear();
                continue;
            }

            if let Some(last) = block.last()
                && line.region.y - last.region.bottom() > LINE_GAP_PX
            {
                block.clear();
            }
            block.push(line);

            if is_question_line(text) {
                let joined = block
                    .iter()
                    .map(|l| l.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                let region = block
                    .iter()
                    .skip(1)
                    .fold(block[0].region, |acc, l| acc.union(&l.region));
                pending = Some(Pending {
                    text: joined,
                    region,
                    options: Vec::new(),
                });
                block.clear();
            }
        }

        if let Some(question) = pending.take() {
            detections.extend(self.finish(question, screen_cue));
        }

        detections
    }

    fn finish(&self, question: Pending, screen_cue: bool) -> Option<Detection> {
        if !self.heuristics.accepts_length(&question.text) {
            tracing::trace!(len = question.text.len(), "question length out of bounds");
            return None;
        }

        let confidence = self
            .heuristics
            .score(&question.text, question.options.len(), screen_cue);

        Some(Detection {
            text: question.text,
            region: question.region,
            confidence,
            options: question.options,
        })
    }
}

impl Detector for HeuristicTextDetector {
    fn name(&self) -> &str {
        "heuristic_text"
    }

    fn detect(&self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError> {
        let lines = self.extractor.extract(frame)?;
        Ok(self.detect_lines(&lines))
    }
}

#[cfg(test)]
mod tests {
    use lookout_capture::OcrError;

    use super::*;

    fn heuristics(context: &str) -> TextHeuristics {
        TextHeuristics {
            min_length: 10,
            max_length: 500,
            context_keywords: context_keywords(context),
        }
    }

    fn line(text: &str, y: i32) -> TextLine {
        TextLine {
            text: text.into(),
            region: CaptureRegion::new(10, y, 300, 16),
            confidence: 0.9,
        }
    }

    struct FixedLines(Vec<TextLine>);

    impl TextExtractor for FixedLines {
        fn name(&self) -> &str {
            "fixed"
        }

        fn extract(&self, _frame: &FrameSnapshot) -> Result<Vec<TextLine>, OcrError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenExtractor;

    impl TextExtractor for BrokenExtractor {
        fn name(&self) -> &str {
            "broken"
        }

        fn extract(&self, _frame: &FrameSnapshot) -> Result<Vec<TextLine>, OcrError> {
            Err(OcrError::Parse("garbage".into()))
        }
    }

    #[test]
    fn option_markers() {
        assert_eq!(parse_option("A) Paris"), Some(("A".into(), "Paris".into())));
        assert_eq!(parse_option("b. Rome"), Some(("B".into(), "Rome".into())));
        assert_eq!(parse_option("3: Oslo"), Some(("3".into(), "Oslo".into())));
        assert_eq!(parse_option(" true "), Some(("True".into(), "True".into())));
        assert_eq!(parse_option("False"), Some(("False".into(), "False".into())));

        assert_eq!(parse_option("2.5 apples"), None);
        assert_eq!(parse_option("Z) nope"), None);
        assert_eq!(parse_option("A)"), None);
        assert_eq!(parse_option("What is this?"), None);
        assert_eq!(parse_option("123) too long"), None);
    }

    #[test]
    fn scoring_adds_up_and_caps() {
        let h = heuristics("European geography");
        assert!((h.score("Which city is the capital?", 0, false) - 0.4).abs() < 1e-6);
        assert!((h.score("Which city is the capital?", 4, false) - 0.7).abs() < 1e-6);
        assert!((h.score("Which european city is the capital?", 4, true) - 1.0).abs() < 1e-6);
        assert_eq!(h.score("plain statement", 0, false), 0.0);
    }

    #[test]
    fn context_keywords_skip_short_and_stop_words() {
        assert_eq!(
            context_keywords("The history of Rome and Greece"),
            vec!["history", "rome", "greece"]
        );
    }

    #[test]
    fn cue_lines() {
        assert!(is_cue_line("Question 3 of 10"));
        assert!(is_cue_line("Time left 0:25"));
        assert!(is_cue_line("Score: 40"));
        assert!(!is_cue_line("The capital of France"));
    }

    #[test]
    fn question_with_options() {
        let detector = HeuristicTextDetector::new(
            Arc::new(FixedLines(Vec::new())),
            heuristics("geography"),
        );
        let lines = vec![
            line("Question 2 of 10", 0),
            line("Which city is the", 40),
            line("capital of France?", 58),
            line("A) Berlin", 90),
            line("B) Paris", 110),
            line("C) Madrid", 130),
        ];

        let detections = detector.detect_lines(&lines);
        assert_eq!(detections.len(), 1);
        let d = &detections[0];
        assert_eq!(d.text, "Which city is the capital of France?");
        assert_eq!(d.region, CaptureRegion::new(10, 40, 300, 34));
        assert_eq!(d.options.len(), 3);
        assert_eq!(d.options[1].label, "B");
        assert_eq!(d.options[1].text, "Paris");
        // '?' + options + progress cue + interrogative
        assert!((d.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn distant_lines_are_not_joined() {
        let detector = HeuristicTextDetector::new(Arc::new(FixedLines(Vec::new())), heuristics(""));
        let lines = vec![line("Unrelated header text", 0), line("How many legs does a spider have?", 200)];

        let detections = detector.detect_lines(&lines);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].text, "How many legs does a spider have?");
    }

    #[test]
    fn numbered_question_prefix() {
        assert!(is_question_line("Q3: Name the largest ocean"));
        assert!(is_question_line("q12. Name the largest ocean"));
        assert!(!is_question_line("Quiet please"));
    }

    #[test]
    fn too_short_is_dropped() {
        let detector = HeuristicTextDetector::new(Arc::new(FixedLines(Vec::new())), heuristics(""));
        assert!(detector.detect_lines(&[line("Why?", 0)]).is_empty());
    }

    #[test]
    fn detect_runs_extractor() {
        let detector = HeuristicTextDetector::new(
            Arc::new(FixedLines(vec![
                line("Is water wet?", 0),
                line("True", 20),
                line("False", 40),
            ])),
            heuristics(""),
        );
        let frame = FrameSnapshot::new(vec![0; 4], 1, 1, CaptureRegion::default());

        let detections = detector.detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].options.len(), 2);
        assert!((detections[0].confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn extractor_failure_surfaces_as_detector_error() {
        let detector = HeuristicTextDetector::new(Arc::new(BrokenExtractor), heuristics(""));
        let frame = FrameSnapshot::new(vec![0; 4], 1, 1, CaptureRegion::default());
        assert!(matches!(detector.detect(&frame), Err(DetectorError::Ocr(_))));
    }
}
