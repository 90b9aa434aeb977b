//! Reader dispatch, schema probing, and capability-backed formats over
//! real files.

use std::path::Path;
use std::sync::Arc;

use entropyguard_core::capability::{CapabilityRegistry, PdfExtractor, TableReader};
use entropyguard_core::errors::{PipelineError, ProcessingError, ValidationError};
use entropyguard_core::types::RawRow;
use entropyguard_io::reader::{open_input, InputSource, RowReader, SchemaProbe};
use serde_json::{Map, Value};

fn drain(reader: &mut dyn RowReader) -> Vec<RawRow> {
    let mut rows = Vec::new();
    while let Some(item) = reader.next_row() {
        rows.push(item.expect("unexpected row error"));
    }
    rows
}

#[test]
fn ndjson_roundtrip_through_open_input() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.ndjson");
    std::fs::write(
        &path,
        "{\"text\": \"first\", \"id\": 1}\n{\"text\": \"second\", \"id\": 2}\n",
    )
    .unwrap();

    let mut reader = open_input(
        &InputSource::Path(path),
        &CapabilityRegistry::new(),
        "text",
    )
    .unwrap();
    let rows = drain(reader.as_mut());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values["text"], "first");
    assert_eq!(rows[1].values["id"], 2);
}

#[test]
fn csv_roundtrip_through_open_input() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.csv");
    std::fs::write(&path, "id,text\n1,alpha\n2,beta\n").unwrap();

    let mut reader = open_input(
        &InputSource::Path(path),
        &CapabilityRegistry::new(),
        "text",
    )
    .unwrap();
    let rows = drain(reader.as_mut());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values["text"], "alpha");
    // CSV values ingest as strings.
    assert_eq!(rows[1].values["id"], "2");
}

#[test]
fn probe_detects_schema_and_text_column_from_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.ndjson");
    let body: String = (0..20)
        .map(|i| {
            format!(
                "{}\n",
                serde_json::json!({
                    "id": i,
                    "tag": "x",
                    "content": format!("row {i} holds the long text payload of this table"),
                })
            )
        })
        .collect();
    std::fs::write(&path, body).unwrap();

    let reader = open_input(
        &InputSource::Path(path),
        &CapabilityRegistry::new(),
        "content",
    )
    .unwrap();
    let (probe, mut replay) = SchemaProbe::probe(reader);
    assert_eq!(probe.sampled_rows, 20);
    assert_eq!(probe.auto_text_column().unwrap(), "content");
    assert!(probe.missing_columns(&["id".into(), "content".into()]).is_empty());
    assert_eq!(
        probe.missing_columns(&["absent".into()]),
        vec!["absent".to_string()]
    );
    // Probing consumes nothing.
    assert_eq!(drain(&mut replay).len(), 20);
}

struct FakeParquet;

impl TableReader for FakeParquet {
    fn name(&self) -> &str {
        "fake-parquet"
    }
    fn extensions(&self) -> &[&str] {
        &["parquet"]
    }
    fn read(&self, _path: &Path) -> Result<Vec<RawRow>, ProcessingError> {
        let mut values = Map::new();
        values.insert("text".into(), Value::String("from parquet".into()));
        Ok(vec![RawRow { values }])
    }
}

#[test]
fn registered_table_reader_claims_its_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.parquet");
    std::fs::write(&path, b"PAR1").unwrap();

    let mut registry = CapabilityRegistry::new();
    registry.register_table_reader(Arc::new(FakeParquet));
    let mut reader = open_input(&InputSource::Path(path), &registry, "text").unwrap();
    let rows = drain(reader.as_mut());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["text"], "from parquet");
}

struct FakePdf;

impl PdfExtractor for FakePdf {
    fn name(&self) -> &str {
        "fake-pdf"
    }
    fn extract_dir(&self, dir: &Path, text_column: &str) -> Result<Vec<RawRow>, ProcessingError> {
        let mut out = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| ProcessingError::Ingest {
                message: e.to_string(),
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();
        for path in entries {
            let mut values = Map::new();
            values.insert(
                text_column.to_string(),
                Value::String(format!("document {}", path.display())),
            );
            out.push(RawRow { values });
        }
        Ok(out)
    }
}

#[test]
fn pdf_directory_requires_and_uses_the_capability() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.pdf"), b"%PDF-").unwrap();
    std::fs::write(tmp.path().join("b.pdf"), b"%PDF-").unwrap();

    // Without the backend: structured capability error.
    let err = open_input(
        &InputSource::Path(tmp.path().to_path_buf()),
        &CapabilityRegistry::new(),
        "text",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::MissingCapability { ref capability })
            if capability == "pdf"
    ));

    // With it: one row per document.
    let mut registry = CapabilityRegistry::new();
    registry.register_pdf(Arc::new(FakePdf));
    let mut reader = open_input(
        &InputSource::Path(tmp.path().to_path_buf()),
        &registry,
        "text",
    )
    .unwrap();
    assert_eq!(drain(reader.as_mut()).len(), 2);
}
