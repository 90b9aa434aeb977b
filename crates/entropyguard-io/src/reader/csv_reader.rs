//! CSV reader. A header row is required; every value is ingested as a
//! JSON string and the schema probe decides which column is the text.

use std::fs::File;
use std::path::Path;

use entropyguard_core::errors::{PipelineError, ValidationError};
use entropyguard_core::types::RawRow;
use serde_json::{Map, Value};

use super::{RowError, RowErrorKind, RowReader};

pub struct CsvRowReader {
    records: csv::StringRecordsIntoIter<File>,
    headers: Vec<String>,
    row: u64,
}

impl CsvRowReader {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|_| ValidationError::InputNotFound {
            path: path.display().to_string(),
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|e| ValidationError::ConfigParse {
                path: path.display().to_string(),
                message: format!("failed to read CSV header: {e}"),
            })?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(Self {
            records: reader.into_records(),
            headers,
            row: 0,
        })
    }
}

impl RowReader for CsvRowReader {
    fn next_row(&mut self) -> Option<Result<RawRow, RowError>> {
        let record = self.records.next()?;
        let row = self.row;
        self.row += 1;
        Some(match record {
            Ok(record) => {
                let mut values = Map::new();
                for (i, header) in self.headers.iter().enumerate() {
                    let cell = record.get(i).unwrap_or("");
                    values.insert(header.clone(), Value::String(cell.to_string()));
                }
                Ok(RawRow { values })
            }
            Err(e) => Err(RowError {
                kind: RowErrorKind::Malformed,
                row,
                message: format!("invalid CSV record: {e}"),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_header_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, "id,text\n1,hello world\n2,\"quoted, comma\"\n").unwrap();

        let mut reader = CsvRowReader::open(&path).unwrap();
        let first = reader.next_row().unwrap().unwrap();
        assert_eq!(first.values["id"], "1");
        assert_eq!(first.values["text"], "hello world");
        let second = reader.next_row().unwrap().unwrap();
        assert_eq!(second.values["text"], "quoted, comma");
        assert!(reader.next_row().is_none());
    }

    #[test]
    fn short_rows_fill_empty_strings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();

        let mut reader = CsvRowReader::open(&path).unwrap();
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(row.values["c"], "");
    }
}
