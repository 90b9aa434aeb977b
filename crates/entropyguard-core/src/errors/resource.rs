//! Resource exhaustion errors (exit code 3).

use super::error_code::{self, GuardErrorCode};

/// Pre-flight and in-flight resource failures. Never retried; the run
/// aborts with whatever audit/stats have accumulated so far left on disk.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Insufficient disk space: need {required} bytes, {available} available")]
    InsufficientDisk { required: u64, available: u64 },

    #[error("Memory ceiling exceeded: {used_mb} MB used, ceiling {ceiling_mb} MB")]
    MemoryCeiling { used_mb: u64, ceiling_mb: u64 },

    #[error("Run timed out after {elapsed_secs}s (budget {budget_secs}s)")]
    Timeout { elapsed_secs: u64, budget_secs: u64 },

    #[error("Embedding backend unavailable: {backend}")]
    EmbedderUnavailable { backend: String },
}

impl GuardErrorCode for ResourceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientDisk { .. } => error_code::INSUFFICIENT_DISK,
            Self::MemoryCeiling { .. } => error_code::MEMORY_CEILING,
            Self::Timeout { .. } => error_code::TIMEOUT,
            Self::EmbedderUnavailable { .. } => error_code::EMBEDDER_UNAVAILABLE,
        }
    }
}
