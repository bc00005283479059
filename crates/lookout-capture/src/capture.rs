use anyhow::{Context, Result};
use lookout_types::{CaptureRegion, FrameSnapshot};
use xcap::Monitor;
use xcap::image::RgbaImage;

use crate::source::{CaptureError, FrameSource};

/// Captures a fixed screen region through xcap
pub struct XcapFrameSource {
    region: CaptureRegion,
}

impl XcapFrameSource {
    pub fn new(region: CaptureRegion) -> Self {
        Self { region }
    }
}

impl FrameSource for XcapFrameSource {
    fn capture(&self) -> Result<FrameSnapshot, CaptureError> {
        let image =
            capture_screen_region(self.region).map_err(|e| CaptureError::Backend(format!("{e:#}")))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(CaptureError::EmptyFrame);
        }

        let (width, height) = (image.width(), image.height());
        Ok(FrameSnapshot::new(image.into_raw(), width, height, self.region))
    }

    fn region(&self) -> CaptureRegion {
        self.region
    }
}

/// Capture a region of the screen
pub fn capture_screen_region(region: CaptureRegion) -> Result<RgbaImage> {
    let monitors = Monitor::all().context("Failed to get monitors")?;

    let monitor = monitors
        .iter()
        .find(|m| {
            region.x >= m.x()
                && region.y >= m.y()
                && region.right() <= m.x() + m.width() as i32
                && region.bottom() <= m.y() + m.height() as i32
        })
        .or(monitors.first())
        .context("No monitor found")?;

    let image = monitor.capture_image().context("Failed to capture screen")?;

    let left = (region.x - monitor.x()).max(0) as u32;
    let top = (region.y - monitor.y()).max(0) as u32;

    Ok(xcap::image::imageops::crop_imm(&image, left, top, region.width, region.height).to_image())
}

/// Encode RGBA pixels as PNG into memory
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    use xcap::image::ImageEncoder;
    let mut buffer = Vec::new();
    xcap::image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(pixels, width, height, xcap::image::ExtendedColorType::Rgba8)
        .context("Failed to encode PNG")?;
    Ok(buffer)
}
