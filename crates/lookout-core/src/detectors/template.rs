use image::{GrayImage, ImageBuffer, Rgba};
use lookout_types::{CaptureRegion, FrameSnapshot};

use crate::error::DetectorError;
use crate::recognition::{Detection, Detector};

/// Finds a reference image inside the frame by grayscale
/// sum-of-absolute-differences
pub struct TemplateDetector {
    template: GrayImage,
    label: String,
    threshold: f32,
}

impl TemplateDetector {
    pub fn new(template: GrayImage, label: impl Into<String>, threshold: f32) -> Self {
        Self {
            template,
            label: label.into(),
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn load(path: &str, label: &str, threshold: f32) -> Result<Self, DetectorError> {
        let template = image::open(path)
            .map_err(|e| DetectorError::Init(format!("{path}: {e}")))?
            .to_luma8();
        if template.width() == 0 || template.height() == 0 {
            return Err(DetectorError::Init(format!("{path}: empty template")));
        }
        Ok(Self::new(template, label, threshold))
    }

    /// Best match position and its similarity in [0, 1]
    fn best_match(&self, frame: &GrayImage) -> Option<(u32, u32, f32)> {
        let (tw, th) = self.template.dimensions();
        let (fw, fh) = frame.dimensions();
        if tw > fw || th > fh {
            return None;
        }

        let max_x = fw - tw;
        let max_y = fh - th;
        let step = (tw.min(th) / 8).max(1);

        let mut best = (0, 0, u64::MAX);
        let mut y = 0;
        while y <= max_y {
            let mut x = 0;
            while x <= max_x {
                let sad = self.sad(frame, x, y, best.2);
                if sad < best.2 {
                    best = (x, y, sad);
                }
                x += step;
            }
            y += step;
        }

        // Refine around the coarse hit
        if step > 1 {
            let (cx, cy, _) = best;
            for y in cy.saturating_sub(step)..=(cy + step).min(max_y) {
                for x in cx.saturating_sub(step)..=(cx + step).min(max_x) {
                    let sad = self.sad(frame, x, y, best.2);
                    if sad < best.2 {
                        best = (x, y, sad);
                    }
                }
            }
        }

        let worst = 255u64 * u64::from(tw) * u64::from(th);
        let similarity = 1.0 - best.2 as f64 / worst as f64;
        Some((best.0, best.1, similarity as f32))
    }

    /// Stops early once `limit` is exceeded
    fn sad(&self, frame: &GrayImage, ox: u32, oy: u32, limit: u64) -> u64 {
        let mut total = 0u64;
        for (x, y, t) in self.template.enumerate_pixels() {
            let f = frame.get_pixel(ox + x, oy + y);
            total += u64::from(f.0[0].abs_diff(t.0[0]));
            if total >= limit {
                return total;
            }
        }
        total
    }
}

fn grayscale(frame: &FrameSnapshot) -> Result<GrayImage, DetectorError> {
    let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(frame.width, frame.height, &frame.pixels)
        .ok_or_else(|| DetectorError::Frame("pixel buffer does not match dimensions".into()))?;
    Ok(image::imageops::grayscale(&view))
}

impl Detector for TemplateDetector {
    fn name(&self) -> &str {
        "template"
    }

    fn detect(&self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError> {
        let gray = grayscale(frame)?;

        let Some((x, y, similarity)) = self.best_match(&gray) else {
            return Ok(Vec::new());
        };

        if similarity < self.threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Detection {
            text: self.label.clone(),
            region: CaptureRegion::new(
                x as i32,
                y as i32,
                self.template.width(),
                self.template.height(),
            ),
            confidence: similarity,
            options: Vec::new(),
        }])
    }
}
