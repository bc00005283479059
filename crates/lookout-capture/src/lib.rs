mod capture;
mod hotkey;
mod ocr;
mod source;

pub use capture::{capture_screen_region, encode_png, XcapFrameSource};
pub use hotkey::HotkeyManager;
pub use ocr::{parse_tsv, OcrError, TesseractExtractor, TextExtractor, TextLine};
pub use source::{capture_with_timeout, CaptureError, FrameSource};
