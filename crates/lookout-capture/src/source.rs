use std::sync::Arc;
use std::time::Duration;

use lookout_types::{CaptureRegion, FrameSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("capture backend failed: {0}")]
    Backend(String),

    #[error("captured frame is empty")]
    EmptyFrame,

    #[error("capture task failed: {0}")]
    Task(String),
}

/// Produces one in-memory frame of a fixed screen region per call.
///
/// Implementations must not write frames to persistent storage.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<FrameSnapshot, CaptureError>;

    fn region(&self) -> CaptureRegion;
}

/// Run a blocking capture on the blocking pool, giving up after `limit`.
///
/// A capture that overruns keeps its thread until the backend returns, but
/// the caller gets a tagged failure instead of waiting.
pub async fn capture_with_timeout(
    source: Arc<dyn FrameSource>,
    limit: Duration,
) -> Result<FrameSnapshot, CaptureError> {
    let task = tokio::task::spawn_blocking(move || source.capture());

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(CaptureError::Task(e.to_string())),
        Err(_) => Err(CaptureError::Timeout(limit)),
    }
}
