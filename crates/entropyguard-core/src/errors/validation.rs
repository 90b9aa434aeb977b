//! Startup and schema validation errors (exit code 2).

use super::error_code::{self, GuardErrorCode};

/// Errors surfaced before any row is processed. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Input not found or unreadable: {path}")]
    InputNotFound { path: String },

    #[error("Missing required columns: {columns:?}")]
    MissingColumns { columns: Vec<String> },

    #[error("dedup_threshold must be within [0, 1], got {value}")]
    InvalidThreshold { value: f64 },

    #[error("min_length must be >= 0, got {value}")]
    InvalidMinLength { value: i64 },

    #[error("batch_size must be >= 1, got {value}")]
    InvalidBatchSize { value: i64 },

    #[error("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")]
    InvalidChunking { chunk_size: usize, chunk_overlap: usize },

    #[error("Unknown configuration keys: {keys:?}")]
    UnknownConfigKeys { keys: Vec<String> },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Unsupported file format: {extension} — supported: .ndjson, .jsonl, .json, .csv")]
    UnsupportedFormat { extension: String },

    #[error("Unable to determine a text column (no string columns in sample)")]
    NoTextColumn,

    #[error("Capability not registered: {capability}")]
    MissingCapability { capability: String },

    #[error("Input dataset is empty")]
    EmptyInput,

    #[error("--json requires a file output; stdout is reserved for records")]
    JsonRequiresFileOutput,
}

impl GuardErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InputNotFound { .. } => error_code::INPUT_NOT_FOUND,
            Self::MissingColumns { .. } => error_code::MISSING_COLUMNS,
            Self::InvalidThreshold { .. } => error_code::INVALID_THRESHOLD,
            Self::InvalidMinLength { .. } => error_code::INVALID_MIN_LENGTH,
            Self::InvalidBatchSize { .. } => error_code::INVALID_BATCH_SIZE,
            Self::InvalidChunking { .. } => error_code::INVALID_CHUNKING,
            Self::UnknownConfigKeys { .. } => error_code::UNKNOWN_CONFIG_KEYS,
            Self::ConfigParse { .. } => error_code::CONFIG_PARSE,
            Self::UnsupportedFormat { .. } => error_code::UNSUPPORTED_FORMAT,
            Self::NoTextColumn => error_code::NO_TEXT_COLUMN,
            Self::MissingCapability { .. } => error_code::MISSING_CAPABILITY,
            Self::EmptyInput => error_code::EMPTY_INPUT,
            Self::JsonRequiresFileOutput => error_code::JSON_REQUIRES_FILE_OUTPUT,
        }
    }
}
