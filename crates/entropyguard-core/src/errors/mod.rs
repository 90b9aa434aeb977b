//! Error taxonomy for the pipeline.
//!
//! Three closed categories, each with its own exit code:
//! validation (2), resource (3), processing (1). `PipelineError` is the
//! umbrella returned by the orchestrator and mapped to the process exit
//! code by the CLI.

pub mod error_code;
mod processing;
mod resource;
mod validation;

pub use error_code::GuardErrorCode;
pub use processing::ProcessingError;
pub use resource::ResourceError;
pub use validation::ValidationError;

/// Umbrella error for a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl PipelineError {
    /// Process exit code contract: 0 success, 1 processing, 2 validation,
    /// 3 resource.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Resource(_) => 3,
            Self::Processing(_) => 1,
        }
    }

    /// Stable category tag used in stderr log lines.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Resource(_) => "resource",
            Self::Processing(_) => "processing",
        }
    }
}

impl GuardErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Resource(e) => e.error_code(),
            Self::Processing(e) => e.error_code(),
        }
    }
}
