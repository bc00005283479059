use lookout_types::CaptureRegion;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// NFKC, case-folded, whitespace collapsed to single spaces
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn digest_u64(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Stable hash of already-normalized text
pub fn text_hash(normalized: &str) -> u64 {
    digest_u64(&[normalized.as_bytes()])
}

/// Stable dedup key: normalized text plus the region snapped to a coarse grid
pub fn content_hash(normalized: &str, region: &CaptureRegion, grid_px: u32) -> u64 {
    let grid = grid_px.max(1) as i32;
    let cell = format!("{}:{}", region.x.div_euclid(grid), region.y.div_euclid(grid));
    digest_u64(&[normalized.as_bytes(), cell.as_bytes()])
}
