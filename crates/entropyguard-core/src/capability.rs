//! Capability registry for optional backends.
//!
//! Optional integrations (PDF extraction, extra table formats, telemetry
//! transport) are registered as typed trait objects. The pipeline depends
//! on the traits only; an absent backend yields a structured
//! `MissingCapability` error instead of a crash.

use std::path::Path;
use std::sync::Arc;

use crate::errors::{ProcessingError, ValidationError};
use crate::types::RawRow;

/// Extracts text records from a directory of PDF files.
pub trait PdfExtractor: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;
    /// Extract one row per document; the text lands under `text_column`.
    fn extract_dir(&self, dir: &Path, text_column: &str) -> Result<Vec<RawRow>, ProcessingError>;
}

impl std::fmt::Debug for dyn PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor").field("name", &self.name()).finish()
    }
}

/// Reads a table format the built-in readers do not cover
/// (Parquet, Excel, ...).
pub trait TableReader: Send + Sync {
    fn name(&self) -> &str;
    /// Extensions this reader claims, lowercase without the dot.
    fn extensions(&self) -> &[&str];
    /// Materialize the rows of `path`. Backends are expected to stream
    /// internally; the pipeline re-batches whatever they produce.
    fn read(&self, path: &Path) -> Result<Vec<RawRow>, ProcessingError>;
}

impl std::fmt::Debug for dyn TableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableReader").field("name", &self.name()).finish()
    }
}

/// Delivers the end-of-run telemetry payload. Delivery failure must be
/// reported, never panicked; the caller logs and moves on.
pub trait TelemetryTransport: Send + Sync {
    fn name(&self) -> &str;
    fn deliver(&self, endpoint: &str, payload: &str) -> Result<(), String>;
}

impl std::fmt::Debug for dyn TelemetryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryTransport").field("name", &self.name()).finish()
    }
}

/// Registry of the optional backends available to a run.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    pdf: Option<Arc<dyn PdfExtractor>>,
    table_readers: Vec<Arc<dyn TableReader>>,
    telemetry: Option<Arc<dyn TelemetryTransport>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pdf(&mut self, backend: Arc<dyn PdfExtractor>) {
        tracing::debug!(backend = backend.name(), "registered pdf extractor");
        self.pdf = Some(backend);
    }

    pub fn register_table_reader(&mut self, backend: Arc<dyn TableReader>) {
        tracing::debug!(backend = backend.name(), "registered table reader");
        self.table_readers.push(backend);
    }

    pub fn register_telemetry(&mut self, backend: Arc<dyn TelemetryTransport>) {
        tracing::debug!(backend = backend.name(), "registered telemetry transport");
        self.telemetry = Some(backend);
    }

    /// The PDF extractor, or a capability error naming what is missing.
    pub fn pdf(&self) -> Result<Arc<dyn PdfExtractor>, ValidationError> {
        self.pdf.clone().ok_or(ValidationError::MissingCapability {
            capability: "pdf".into(),
        })
    }

    /// Find a registered reader claiming `extension` (lowercase, no dot).
    pub fn table_reader(&self, extension: &str) -> Option<Arc<dyn TableReader>> {
        self.table_readers
            .iter()
            .find(|r| r.extensions().contains(&extension))
            .cloned()
    }

    pub fn telemetry(&self) -> Option<Arc<dyn TelemetryTransport>> {
        self.telemetry.clone()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("pdf", &self.pdf.as_ref().map(|b| b.name().to_string()))
            .field(
                "table_readers",
                &self
                    .table_readers
                    .iter()
                    .map(|r| r.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field(
                "telemetry",
                &self.telemetry.as_ref().map(|t| t.name().to_string()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTransport;
    impl TelemetryTransport for NullTransport {
        fn name(&self) -> &str {
            "null"
        }
        fn deliver(&self, _endpoint: &str, _payload: &str) -> Result<(), String> {
            Ok(())
        }
    }

    #[test]
    fn missing_pdf_backend_is_a_capability_error() {
        let reg = CapabilityRegistry::new();
        let err = reg.pdf().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingCapability { ref capability } if capability == "pdf"
        ));
    }

    #[test]
    fn telemetry_is_optional() {
        let mut reg = CapabilityRegistry::new();
        assert!(reg.telemetry().is_none());
        reg.register_telemetry(Arc::new(NullTransport));
        assert!(reg.telemetry().is_some());
    }
}
