use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use lookout_types::{CaptureRegion, FrameSnapshot};

use crate::capture::encode_png;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("failed to run OCR backend: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("OCR backend exited with {status}: {stderr}")]
    Backend { status: String, stderr: String },

    #[error("unreadable OCR output: {0}")]
    Parse(String),

    #[error("OCR backend did not finish within {0:?}")]
    Timeout(Duration),
}

/// One recognized line of text, in frame-local coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub region: CaptureRegion,
    /// 0.0 - 1.0
    pub confidence: f32,
}

/// Contract for text-extraction backends consumed by text-based detectors
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, frame: &FrameSnapshot) -> Result<Vec<TextLine>, OcrError>;
}

/// Runs the `tesseract` CLI, feeding the frame through stdin so nothing
/// touches the disk
pub struct TesseractExtractor {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The child is killed once a single extraction runs past `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that the binary can be launched at all
    pub fn check_available(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;

        if output.success() {
            Ok(())
        } else {
            Err(OcrError::Backend {
                status: output.to_string(),
                stderr: String::new(),
            })
        }
    }
}

impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn extract(&self, frame: &FrameSnapshot) -> Result<Vec<TextLine>, OcrError> {
        let png = encode_png(&frame.pixels, frame.width, frame.height)
            .map_err(|e| OcrError::Encode(format!("{e:#}")))?;

        let child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = run_with_deadline(child, &png, self.timeout)?;

        if !output.status.success() {
            return Err(OcrError::Backend {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        parse_tsv(&tsv)
    }
}

fn drain(mut pipe: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Feed `input` to a piped child and collect its output. Pipes are serviced
/// on scoped threads so a full buffer cannot deadlock; the child is killed
/// once `timeout` passes.
fn run_with_deadline(mut child: Child, input: &[u8], timeout: Duration) -> Result<Output, OcrError> {
    let missing = |pipe: &str| OcrError::Parse(format!("{pipe} not captured"));
    let mut stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;
    let deadline = Instant::now() + timeout;

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || {
            let result = stdin.write_all(input);
            drop(stdin);
            result
        });
        let out = scope.spawn(move || drain(stdout));
        let err = scope.spawn(move || drain(stderr));

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(OcrError::Timeout(timeout));
                }
                Ok(None) => std::thread::sleep(WAIT_POLL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(OcrError::Spawn(e));
                }
            }
        };

        if let Ok(Err(e)) = writer.join() {
            tracing::debug!("tesseract closed stdin early: {}", e);
        }
        let joined = |name: &str| OcrError::Parse(format!("{name} reader panicked"));
        let stdout = out.join().map_err(|_| joined("stdout"))?;
        let stderr = err.join().map_err(|_| joined("stderr"))?;

        Ok(Output {
            status: status?,
            stdout: stdout?,
            stderr: stderr?,
        })
    })
}

#[derive(Default)]
struct LineAccumulator {
    key: (u32, u32, u32, u32),
    words: Vec<String>,
    region: Option<CaptureRegion>,
    confidence_sum: f32,
}

impl LineAccumulator {
    fn finish(self) -> Option<TextLine> {
        let region = self.region?;
        if self.words.is_empty() {
            return None;
        }
        let confidence = (self.confidence_sum / self.words.len() as f32 / 100.0).clamp(0.0, 1.0);
        Some(TextLine {
            text: self.words.join(" "),
            region,
            confidence,
        })
    }
}

/// Group word-level rows of tesseract's TSV output into lines
pub fn parse_tsv(tsv: &str) -> Result<Vec<TextLine>, OcrError> {
    let mut lines = Vec::new();
    let mut current: Option<LineAccumulator> = None;

    for (row, raw) in tsv.lines().enumerate() {
        if row == 0 || raw.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = raw.splitn(12, '\t').collect();
        if cols.len() < 12 {
            return Err(OcrError::Parse(format!("row {row} has {} columns", cols.len())));
        }

        let num = |i: usize| -> Result<i64, OcrError> {
            cols[i]
                .trim()
                .parse::<i64>()
                .map_err(|_| OcrError::Parse(format!("row {row} column {i}: '{}'", cols[i])))
        };

        // Level 5 rows are words; others describe page/block/paragraph/line boxes
        if num(0)? != 5 {
            continue;
        }

        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = (num(1)? as u32, num(2)? as u32, num(3)? as u32, num(4)? as u32);
        let region = CaptureRegion::new(num(6)? as i32, num(7)? as i32, num(8)? as u32, num(9)? as u32);
        let confidence = cols[10]
            .trim()
            .parse::<f32>()
            .map_err(|_| OcrError::Parse(format!("row {row} confidence '{}'", cols[10])))?
            .max(0.0);

        let same_line = current.as_ref().is_some_and(|acc| acc.key == key);
        if !same_line && let Some(done) = current.take().and_then(LineAccumulator::finish) {
            lines.push(done);
        }

        let acc = current.get_or_insert_with(|| LineAccumulator {
            key,
            ..Default::default()
        });
        acc.words.push(text.to_string());
        acc.confidence_sum += confidence;
        acc.region = Some(match acc.region {
            Some(existing) => existing.union(&region),
            None => region,
        });
    }

    if let Some(done) = current.and_then(LineAccumulator::finish) {
        lines.push(done);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_groups_words_into_lines() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t60\t20\t90\tWhat\n\
             5\t1\t1\t1\t1\t2\t80\t12\t30\t18\t80\tis\n\
             5\t1\t1\t1\t1\t3\t120\t10\t90\t20\t70\tRust?\n\
             5\t1\t1\t1\t2\t1\t10\t40\t20\t20\t95\tA)\n\
             5\t1\t1\t1\t2\t2\t40\t40\t80\t20\t85\tLanguage\n"
        );

        let lines = parse_tsv(&tsv).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "What is Rust?");
        assert_eq!(lines[0].region, CaptureRegion::new(10, 10, 200, 20));
        assert!((lines[0].confidence - 0.8).abs() < 1e-4);
        assert_eq!(lines[1].text, "A) Language");
    }

    #[test]
    fn test_parse_skips_blank_words() {
        let tsv = format!("{HEADER}\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t-1\t \n");
        assert!(parse_tsv(&tsv).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_stalled_backend_is_killed_at_deadline() {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let started = Instant::now();
        let result = run_with_deadline(child, b"", Duration::from_millis(50));

        assert!(matches!(result, Err(OcrError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_output_is_collected() {
        let child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let output = run_with_deadline(child, b"level\ttext\n", Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"level\ttext\n");
    }

    #[test]
    fn test_parse_rejects_truncated_rows() {
        let tsv = format!("{HEADER}\n5\t1\t1\n");
        assert!(matches!(parse_tsv(&tsv), Err(OcrError::Parse(_))));
    }
}
