//! Mid-run processing errors (exit code 1).
//!
//! Per-batch processing failures are retried once by the orchestrator,
//! then surfaced. Per-row failures are audited and skipped instead.

use super::error_code::{self, GuardErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Ingest failed: {message}")]
    Ingest { message: String },

    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Vector index insert failed: {message}")]
    IndexInsert { message: String },

    #[error("Chunker exceeded maximum recursion depth")]
    ChunkerOverflow,

    #[error("Output write failed: {message}")]
    OutputWrite { message: String },

    #[error("Audit log write failed: {message}")]
    AuditWrite { message: String },

    #[error("Checkpoint failed: {message}")]
    Checkpoint { message: String },
}

impl ProcessingError {
    /// Whether the orchestrator may retry the enclosing batch once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Embedding { .. } | Self::IndexInsert { .. })
    }
}

impl GuardErrorCode for ProcessingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Ingest { .. } => error_code::INGEST_FAILED,
            Self::Embedding { .. } => error_code::EMBEDDING_FAILED,
            Self::IndexInsert { .. } => error_code::INDEX_INSERT_FAILED,
            Self::ChunkerOverflow => error_code::CHUNKER_OVERFLOW,
            Self::OutputWrite { .. } => error_code::OUTPUT_WRITE_FAILED,
            Self::AuditWrite { .. } => error_code::AUDIT_WRITE_FAILED,
            Self::Checkpoint { .. } => error_code::CHECKPOINT_FAILED,
        }
    }
}
