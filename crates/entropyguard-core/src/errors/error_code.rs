//! Stable string codes attached to every error variant.
//!
//! Codes never change once shipped; CI gates and log scrapers key on them.

/// Trait implemented by all EntropyGuard error enums.
pub trait GuardErrorCode {
    /// Stable, machine-readable code for this error.
    fn error_code(&self) -> &'static str;
}

// Validation
pub const INPUT_NOT_FOUND: &str = "EG_INPUT_NOT_FOUND";
pub const MISSING_COLUMNS: &str = "EG_MISSING_COLUMNS";
pub const INVALID_THRESHOLD: &str = "EG_INVALID_THRESHOLD";
pub const INVALID_MIN_LENGTH: &str = "EG_INVALID_MIN_LENGTH";
pub const INVALID_BATCH_SIZE: &str = "EG_INVALID_BATCH_SIZE";
pub const INVALID_CHUNKING: &str = "EG_INVALID_CHUNKING";
pub const UNKNOWN_CONFIG_KEYS: &str = "EG_UNKNOWN_CONFIG_KEYS";
pub const CONFIG_PARSE: &str = "EG_CONFIG_PARSE";
pub const UNSUPPORTED_FORMAT: &str = "EG_UNSUPPORTED_FORMAT";
pub const NO_TEXT_COLUMN: &str = "EG_NO_TEXT_COLUMN";
pub const MISSING_CAPABILITY: &str = "EG_MISSING_CAPABILITY";
pub const EMPTY_INPUT: &str = "EG_EMPTY_INPUT";
pub const JSON_REQUIRES_FILE_OUTPUT: &str = "EG_JSON_REQUIRES_FILE_OUTPUT";

// Resource
pub const INSUFFICIENT_DISK: &str = "EG_INSUFFICIENT_DISK";
pub const MEMORY_CEILING: &str = "EG_MEMORY_CEILING";
pub const TIMEOUT: &str = "EG_TIMEOUT";
pub const EMBEDDER_UNAVAILABLE: &str = "EG_EMBEDDER_UNAVAILABLE";

// Processing
pub const INGEST_FAILED: &str = "EG_INGEST_FAILED";
pub const EMBEDDING_FAILED: &str = "EG_EMBEDDING_FAILED";
pub const INDEX_INSERT_FAILED: &str = "EG_INDEX_INSERT_FAILED";
pub const CHUNKER_OVERFLOW: &str = "EG_CHUNKER_OVERFLOW";
pub const OUTPUT_WRITE_FAILED: &str = "EG_OUTPUT_WRITE_FAILED";
pub const AUDIT_WRITE_FAILED: &str = "EG_AUDIT_WRITE_FAILED";
pub const CHECKPOINT_FAILED: &str = "EG_CHECKPOINT_FAILED";
