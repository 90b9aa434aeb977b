//! Schema discovery over a bounded sample.
//!
//! The probe pulls up to `SAMPLE_ROWS` rows, classifies column types, and
//! can pick a text column automatically (largest average character length
//! among string columns, ties broken by first appearance). The consumed
//! rows are replayed by `ProbedReader`, so stdin works like any file.

use std::collections::VecDeque;

use entropyguard_core::errors::ValidationError;
use entropyguard_core::types::{ColumnDescriptor, ColumnType, RawRow};
use serde_json::Value;

use super::{RowError, RowReader};

/// Rows inspected by the probe.
pub const SAMPLE_ROWS: usize = 100;

/// Result of probing the head of the input.
#[derive(Debug)]
pub struct SchemaProbe {
    pub columns: Vec<ColumnDescriptor>,
    /// Per string column: (name, average char length).
    avg_char_len: Vec<(String, f64)>,
    pub sampled_rows: usize,
}

impl SchemaProbe {
    /// Probe `reader`, returning the schema and a replaying reader that
    /// yields the sampled rows first.
    pub fn probe(mut reader: Box<dyn RowReader>) -> (Self, ProbedReader) {
        let mut buffered: VecDeque<Result<RawRow, RowError>> = VecDeque::new();
        let mut names: Vec<String> = Vec::new();
        let mut types: Vec<ColumnType> = Vec::new();
        let mut char_totals: Vec<(String, u64, u64)> = Vec::new();
        let mut sampled = 0usize;

        while sampled < SAMPLE_ROWS {
            let Some(item) = reader.next_row() else { break };
            if let Ok(row) = &item {
                sampled += 1;
                for (name, value) in &row.values {
                    let observed = ColumnType::of(value);
                    match names.iter().position(|n| n == name) {
                        Some(i) => types[i] = types[i].merge(observed),
                        None => {
                            names.push(name.clone());
                            types.push(observed);
                        }
                    }
                    if let Value::String(s) = value {
                        let len = s.chars().count() as u64;
                        match char_totals.iter_mut().find(|(n, _, _)| n == name) {
                            Some((_, total, count)) => {
                                *total += len;
                                *count += 1;
                            }
                            None => char_totals.push((name.clone(), len, 1)),
                        }
                    }
                }
            }
            buffered.push_back(item);
        }

        let columns = names
            .into_iter()
            .zip(types)
            .map(|(name, ty)| ColumnDescriptor { name, ty })
            .collect();
        let avg_char_len = char_totals
            .into_iter()
            .map(|(name, total, count)| (name, total as f64 / count.max(1) as f64))
            .collect();

        let probe = Self {
            columns,
            avg_char_len,
            sampled_rows: sampled,
        };
        let replaying = ProbedReader {
            buffered,
            inner: reader,
        };
        (probe, replaying)
    }

    /// Columns from `required` that the sample never showed.
    pub fn missing_columns(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|r| !self.columns.iter().any(|c| c.name == **r))
            .cloned()
            .collect()
    }

    /// True when `name` appeared in the sample.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Pick the text column: the string column with the largest average
    /// character length. Ties (and the single-column case) resolve to the
    /// earliest-seen column.
    pub fn auto_text_column(&self) -> Result<String, ValidationError> {
        let mut best: Option<(&str, f64)> = None;
        for c in &self.columns {
            if c.ty != ColumnType::String {
                continue;
            }
            let avg = self
                .avg_char_len
                .iter()
                .find(|(n, _)| n == &c.name)
                .map_or(0.0, |(_, a)| *a);
            match best {
                Some((_, best_avg)) if avg <= best_avg => {}
                _ => best = Some((&c.name, avg)),
            }
        }
        best.map(|(name, avg)| {
            tracing::info!(column = name, avg_chars = avg, "auto-detected text column");
            name.to_string()
        })
        .ok_or(ValidationError::NoTextColumn)
    }
}

/// Reader that replays the probed sample before draining the inner reader.
pub struct ProbedReader {
    buffered: VecDeque<Result<RawRow, RowError>>,
    inner: Box<dyn RowReader>,
}

impl RowReader for ProbedReader {
    fn next_row(&mut self) -> Option<Result<RawRow, RowError>> {
        if let Some(item) = self.buffered.pop_front() {
            return Some(item);
        }
        self.inner.next_row()
    }
}
