//! Lazy row readers over the supported input formats.
//!
//! Built-in: NDJSON/JSONL (including stdin) and CSV with a header row.
//! Parquet, Excel, and PDF directories go through the capability registry;
//! an absent backend is a structured capability error, not a crash.

mod csv_reader;
mod ndjson;
mod probe;

pub use probe::{ProbedReader, SchemaProbe};

use std::collections::VecDeque;

use entropyguard_core::capability::CapabilityRegistry;
use entropyguard_core::errors::{PipelineError, ValidationError};
use entropyguard_core::types::RawRow;

use csv_reader::CsvRowReader;
use ndjson::NdjsonReader;

/// How a row read can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowErrorKind {
    /// The row itself is unusable (malformed JSON, ragged CSV record).
    /// Audited and skipped.
    Malformed,
    /// The underlying stream failed. Aborts the run.
    Io,
}

/// A failed row read, scoped to a 0-based row ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub kind: RowErrorKind,
    pub row: u64,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// Streaming row source. Implementations must be lazy: no full-file
/// materialization.
pub trait RowReader: Send {
    fn next_row(&mut self) -> Option<Result<RawRow, RowError>>;
}

impl std::fmt::Debug for dyn RowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowReader").finish()
    }
}

/// Where the input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// `-` on the command line.
    Stdin,
    Path(std::path::PathBuf),
}

impl InputSource {
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            Self::Stdin
        } else {
            Self::Path(raw.into())
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Stdin => "<stdin>".to_string(),
            Self::Path(p) => p.display().to_string(),
        }
    }
}

/// Open an input source, dispatching on its extension.
///
/// Directories are treated as PDF collections and require the `pdf`
/// capability. Stdin is always NDJSON.
pub fn open_input(
    source: &InputSource,
    registry: &CapabilityRegistry,
    text_column_hint: &str,
) -> Result<Box<dyn RowReader>, PipelineError> {
    let path = match source {
        InputSource::Stdin => return Ok(Box::new(NdjsonReader::from_stdin())),
        InputSource::Path(p) => p,
    };

    if !path.exists() {
        return Err(ValidationError::InputNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    if path.is_dir() {
        let extractor = registry.pdf().map_err(PipelineError::from)?;
        let rows = extractor.extract_dir(path, text_column_hint)?;
        tracing::info!(dir = %path.display(), rows = rows.len(), "extracted pdf directory");
        return Ok(Box::new(MaterializedReader::new(rows)));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "ndjson" | "jsonl" | "json" => Ok(Box::new(NdjsonReader::open(path)?)),
        "csv" => Ok(Box::new(CsvRowReader::open(path)?)),
        other => {
            if let Some(backend) = registry.table_reader(other) {
                let rows = backend.read(path)?;
                tracing::info!(
                    backend = backend.name(),
                    path = %path.display(),
                    rows = rows.len(),
                    "read via table-reader capability"
                );
                Ok(Box::new(MaterializedReader::new(rows)))
            } else if matches!(other, "parquet" | "xlsx") {
                Err(ValidationError::MissingCapability {
                    capability: other.to_string(),
                }
                .into())
            } else {
                Err(ValidationError::UnsupportedFormat {
                    extension: format!(".{other}"),
                }
                .into())
            }
        }
    }
}

/// Adapter for capability backends that hand back a materialized batch.
struct MaterializedReader {
    rows: VecDeque<RawRow>,
}

impl MaterializedReader {
    fn new(rows: Vec<RawRow>) -> Self {
        Self { rows: rows.into() }
    }
}

impl RowReader for MaterializedReader {
    fn next_row(&mut self) -> Option<Result<RawRow, RowError>> {
        self.rows.pop_front().map(Ok)
    }
}
