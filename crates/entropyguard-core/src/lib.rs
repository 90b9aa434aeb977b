//! # entropyguard-core
//!
//! Foundation crate for the EntropyGuard data-quality pipeline.
//! Defines records, errors, configuration, the audit log, run statistics,
//! the capability registry, and the runtime context.
//! Every other crate in the workspace depends on this.

pub mod audit;
pub mod capability;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod stats;
pub mod telemetry;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use audit::{AuditEvent, AuditLog, DropReason};
pub use capability::CapabilityRegistry;
pub use config::PipelineConfig;
pub use errors::{GuardErrorCode, PipelineError, ProcessingError, ResourceError, ValidationError};
pub use runtime::RuntimeContext;
pub use stats::PipelineStats;
pub use types::{ColumnType, Record, RecordBatch};
