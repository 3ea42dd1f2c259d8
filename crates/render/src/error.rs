use afterglow_common::ObjectId;

use crate::backend::TargetId;

/// Errors from render-target management and pass execution.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid render target size {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },
    #[error("render target allocation failed: requested {requested} bytes, {available} available")]
    ResourceExhaustion { requested: u64, available: u64 },
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetId),
    #[error("unknown scene object {0:?}")]
    UnknownObject(ObjectId),
    #[error("{pass} pass reads and writes target {target:?}")]
    FeedbackLoop { pass: &'static str, target: TargetId },
    #[error("render target {0:?} has no depth attachment")]
    MissingDepth(TargetId),
    #[error("target size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}
