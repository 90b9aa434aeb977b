//! Pipeline configuration.
//!
//! Keys mirror the CLI surface in snake_case. Every field is optional so a
//! partial config file can be merged with CLI flags; `effective_*`
//! accessors apply the documented defaults. Unknown keys are rejected at
//! load time.

mod loader;

pub use loader::{discover_config_file, load_config_file};

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Default similarity threshold for semantic deduplication.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.95;
/// Default minimum text length after sanitization.
pub const DEFAULT_MIN_LENGTH: usize = 50;
/// Default number of rows per streaming batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
/// Default character overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
/// Default embedder sub-batch size.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 256;

/// What to do with rows whose text is null or empty after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Remove the row and audit it.
    #[default]
    Drop,
    /// Substitute the configured fill value.
    Fill,
}

/// Full pipeline configuration. Field names are the config-file keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    /// Text column to process; auto-detected from a sample when absent.
    pub text_column: Option<String>,
    pub required_columns: Option<Vec<String>>,
    pub min_length: Option<i64>,
    pub dedup_threshold: Option<f64>,
    /// Embedder identifier, e.g. "hashing" or a model2vec model id.
    pub model_name: Option<String>,
    pub batch_size: Option<i64>,
    /// Chunking is enabled when this is > 0.
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub chunk_separators: Option<Vec<String>>,
    pub audit_log_path: Option<String>,
    pub handle_missing: Option<MissingPolicy>,
    pub fill_value: Option<String>,
    /// Replace emitted text with its normalized form (off by default;
    /// normalization is otherwise used only for fingerprinting).
    pub normalize_text: Option<bool>,
    pub show_progress: Option<bool>,
    pub checkpoint_dir: Option<String>,
    pub resume: Option<bool>,
    pub max_memory_mb: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub embed_batch_size: Option<usize>,
    pub telemetry_endpoint: Option<String>,
    /// Hint allowing the vector index to discard raw vectors it does not
    /// need for search.
    pub store_vectors: Option<bool>,
    pub dry_run: Option<bool>,
}

impl PipelineConfig {
    /// Merge `self` (CLI values) over `base` (config file values).
    /// A CLI value wins only when present; `None` never overrides.
    pub fn merged_over(self, base: Self) -> Self {
        Self {
            input_path: self.input_path.or(base.input_path),
            output_path: self.output_path.or(base.output_path),
            text_column: self.text_column.or(base.text_column),
            required_columns: self.required_columns.or(base.required_columns),
            min_length: self.min_length.or(base.min_length),
            dedup_threshold: self.dedup_threshold.or(base.dedup_threshold),
            model_name: self.model_name.or(base.model_name),
            batch_size: self.batch_size.or(base.batch_size),
            chunk_size: self.chunk_size.or(base.chunk_size),
            chunk_overlap: self.chunk_overlap.or(base.chunk_overlap),
            chunk_separators: self.chunk_separators.or(base.chunk_separators),
            audit_log_path: self.audit_log_path.or(base.audit_log_path),
            handle_missing: self.handle_missing.or(base.handle_missing),
            fill_value: self.fill_value.or(base.fill_value),
            normalize_text: self.normalize_text.or(base.normalize_text),
            show_progress: self.show_progress.or(base.show_progress),
            checkpoint_dir: self.checkpoint_dir.or(base.checkpoint_dir),
            resume: self.resume.or(base.resume),
            max_memory_mb: self.max_memory_mb.or(base.max_memory_mb),
            timeout_secs: self.timeout_secs.or(base.timeout_secs),
            embed_batch_size: self.embed_batch_size.or(base.embed_batch_size),
            telemetry_endpoint: self.telemetry_endpoint.or(base.telemetry_endpoint),
            store_vectors: self.store_vectors.or(base.store_vectors),
            dry_run: self.dry_run.or(base.dry_run),
        }
    }

    /// Enforce parameter ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(t) = self.dedup_threshold {
            if !(0.0..=1.0).contains(&t) || !t.is_finite() {
                return Err(ValidationError::InvalidThreshold { value: t });
            }
        }
        if let Some(m) = self.min_length {
            if m < 0 {
                return Err(ValidationError::InvalidMinLength { value: m });
            }
        }
        if let Some(b) = self.batch_size {
            if b < 1 {
                return Err(ValidationError::InvalidBatchSize { value: b });
            }
        }
        if self.chunking_enabled() {
            let size = self.chunk_size.unwrap_or(0);
            let overlap = self.effective_chunk_overlap();
            if overlap >= size {
                return Err(ValidationError::InvalidChunking {
                    chunk_size: size,
                    chunk_overlap: overlap,
                });
            }
        }
        Ok(())
    }

    /// Canonical JSON used for checkpoint fingerprinting. Only the fields
    /// that change the cleaned output participate — run-control knobs
    /// (resume, dry_run, paths, progress) must not invalidate a
    /// checkpoint.
    pub fn canonical_json(&self) -> String {
        let semantic = serde_json::json!({
            "text_column": self.text_column,
            "required_columns": self.required_columns,
            "min_length": self.min_length,
            "dedup_threshold": self.dedup_threshold,
            "model_name": self.model_name,
            "batch_size": self.batch_size,
            "chunk_size": self.chunk_size,
            "chunk_overlap": self.chunk_overlap,
            "chunk_separators": self.chunk_separators,
            "handle_missing": self.handle_missing,
            "fill_value": self.fill_value,
            "normalize_text": self.normalize_text,
        });
        semantic.to_string()
    }

    /// Input path, defaulting to `-` (stdin). Applied after merging so a
    /// config-file path wins over an absent CLI flag.
    pub fn effective_input_path(&self) -> String {
        self.input_path.clone().unwrap_or_else(|| "-".to_string())
    }

    /// Output path, defaulting to `-` (stdout).
    pub fn effective_output_path(&self) -> String {
        self.output_path.clone().unwrap_or_else(|| "-".to_string())
    }

    pub fn effective_min_length(&self) -> usize {
        self.min_length.map_or(DEFAULT_MIN_LENGTH, |m| m.max(0) as usize)
    }

    pub fn effective_dedup_threshold(&self) -> f64 {
        self.dedup_threshold.unwrap_or(DEFAULT_DEDUP_THRESHOLD)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.map_or(DEFAULT_BATCH_SIZE, |b| b.max(1) as usize)
    }

    pub fn effective_chunk_overlap(&self) -> usize {
        self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP)
    }

    pub fn effective_embed_batch_size(&self) -> usize {
        self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE)
    }

    pub fn effective_missing_policy(&self) -> MissingPolicy {
        self.handle_missing.unwrap_or_default()
    }

    pub fn effective_separators(&self) -> Vec<String> {
        self.chunk_separators.clone().unwrap_or_else(|| {
            vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ]
        })
    }

    pub fn effective_show_progress(&self) -> bool {
        self.show_progress.unwrap_or(true)
    }

    pub fn effective_store_vectors(&self) -> bool {
        self.store_vectors.unwrap_or(true)
    }

    /// Chunking is active only for a positive chunk size.
    pub fn chunking_enabled(&self) -> bool {
        self.chunk_size.is_some_and(|s| s > 0)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let c = PipelineConfig::default();
        assert_eq!(c.effective_input_path(), "-");
        assert_eq!(c.effective_output_path(), "-");
        assert_eq!(c.effective_min_length(), 50);
        assert_eq!(c.effective_dedup_threshold(), 0.95);
        assert_eq!(c.effective_batch_size(), 10_000);
        assert_eq!(c.effective_chunk_overlap(), 50);
        assert!(!c.chunking_enabled());
        assert_eq!(
            c.effective_separators(),
            vec!["\n\n".to_string(), "\n".to_string(), " ".to_string(), String::new()]
        );
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut c = PipelineConfig::default();
        c.dedup_threshold = Some(1.5);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidThreshold { .. })
        ));

        let mut c = PipelineConfig::default();
        c.min_length = Some(-1);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidMinLength { .. })
        ));

        let mut c = PipelineConfig::default();
        c.batch_size = Some(0);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn validate_rejects_overlap_at_or_above_chunk_size() {
        let mut c = PipelineConfig::default();
        c.chunk_size = Some(100);
        c.chunk_overlap = Some(100);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvalidChunking { .. })
        ));

        c.chunk_overlap = Some(99);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn merge_prefers_present_cli_values() {
        let file = PipelineConfig {
            text_column: Some("text".into()),
            min_length: Some(50),
            dedup_threshold: Some(0.95),
            model_name: Some("default-model".into()),
            ..Default::default()
        };
        let cli = PipelineConfig {
            text_column: Some("content".into()),
            min_length: Some(100),
            batch_size: Some(5000),
            ..Default::default()
        };
        let merged = cli.merged_over(file);
        assert_eq!(merged.text_column.as_deref(), Some("content"));
        assert_eq!(merged.min_length, Some(100));
        assert_eq!(merged.dedup_threshold, Some(0.95));
        assert_eq!(merged.model_name.as_deref(), Some("default-model"));
        assert_eq!(merged.batch_size, Some(5000));
    }
}
