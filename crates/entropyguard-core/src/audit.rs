//! Per-row audit trail.
//!
//! Every dropped or suppressed row produces exactly one event. Events are
//! buffered in memory in detection order and rewritten atomically as a JSON
//! array at the end of the run (and on abort, so forensics always have the
//! partial trail).

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ProcessingError;

/// Closed set of reasons a row can leave the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    ExactDuplicate,
    SemanticDuplicate,
    ValidationEmptyOrNull,
    ValidationTooShort,
    SchemaMissingColumn,
    SanitizationDroppedNull,
}

impl DropReason {
    /// Whether this reason counts toward duplicate statistics rather than
    /// validation drops.
    pub fn is_duplicate(self) -> bool {
        matches!(self, Self::ExactDuplicate | Self::SemanticDuplicate)
    }
}

/// One audit entry. `row_index` is the record's `original_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub row_index: u64,
    pub reason: DropReason,
    pub details: String,
}

/// Append-only in-memory audit buffer.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: Vec<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a drop. Ordering follows detection time.
    pub fn record(&mut self, row_index: u64, reason: DropReason, details: impl Into<String>) {
        self.events.push(AuditEvent {
            row_index,
            reason,
            details: details.into(),
        });
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Count events matching a reason.
    pub fn count(&self, reason: DropReason) -> usize {
        self.events.iter().filter(|e| e.reason == reason).count()
    }

    /// Serialize the full trail as a JSON array.
    pub fn to_json(&self) -> Result<String, ProcessingError> {
        serde_json::to_string_pretty(&self.events).map_err(|e| ProcessingError::AuditWrite {
            message: e.to_string(),
        })
    }

    /// Rewrite `path` atomically: write to a sibling temp file, then rename.
    /// A crash mid-flush leaves either the old trail or the new one, never a
    /// torn file.
    pub fn flush_to(&self, path: &Path) -> Result<(), ProcessingError> {
        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| ProcessingError::AuditWrite {
            message: format!("{}: {e}", path.display()),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let mut f = std::fs::File::create(&tmp).map_err(io_err)?;
        f.write_all(json.as_bytes()).map_err(io_err)?;
        f.sync_all().map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;

        tracing::debug!(path = %path.display(), events = self.events.len(), "audit log flushed");
        Ok(())
    }
}
