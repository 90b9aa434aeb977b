//! Line-delimited JSON reader, the default input format.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use entropyguard_core::errors::{PipelineError, ValidationError};
use entropyguard_core::types::RawRow;
use serde_json::Value;

use super::{RowError, RowErrorKind, RowReader};

pub struct NdjsonReader {
    lines: Box<dyn BufRead + Send>,
    row: u64,
}

impl NdjsonReader {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|_| ValidationError::InputNotFound {
            path: path.display().to_string(),
        })?;
        Ok(Self {
            lines: Box::new(BufReader::new(file)),
            row: 0,
        })
    }

    pub fn from_stdin() -> Self {
        Self {
            lines: Box::new(BufReader::new(std::io::stdin())),
            row: 0,
        }
    }

    #[cfg(test)]
    pub fn from_string(data: String) -> Self {
        Self {
            lines: Box::new(std::io::Cursor::new(data)),
            row: 0,
        }
    }
}

impl RowReader for NdjsonReader {
    fn next_row(&mut self) -> Option<Result<RawRow, RowError>> {
        loop {
            let mut line = String::new();
            match self.lines.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(RowError {
                        kind: RowErrorKind::Io,
                        row: self.row,
                        message: e.to_string(),
                    }));
                }
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                // Blank lines are not rows; keep ordinals aligned with
                // non-blank content.
                continue;
            }
            let row = self.row;
            self.row += 1;
            return Some(match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(values)) => Ok(RawRow { values }),
                Ok(other) => Err(RowError {
                    kind: RowErrorKind::Malformed,
                    row,
                    message: format!("expected a JSON object, got {}", type_name(&other)),
                }),
                Err(e) => Err(RowError {
                    kind: RowErrorKind::Malformed,
                    row,
                    message: format!("invalid JSON: {e}"),
                }),
            });
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
