//! Per-row text sanitation.
//!
//! Steps, in order: trim, collapse internal whitespace, PII scrubbing,
//! missing-value policy. Lowercasing and punctuation squeezing are part of
//! fingerprint normalization only — the emitted record keeps its original
//! casing unless `normalize_text` is requested. Batch work fans out over
//! rayon; every row transform is pure.

pub mod pii;

use entropyguard_core::config::MissingPolicy;
use entropyguard_core::types::{RawRow, Record};
use rayon::prelude::*;
use serde_json::Value;

use pii::PiiScrubber;

/// Sanitizer configuration, resolved once per run.
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    pub remove_pii: bool,
    /// Replace the emitted text with its normalized form.
    pub normalize_text: bool,
    pub missing: MissingPolicy,
    pub fill_value: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            remove_pii: true,
            normalize_text: false,
            missing: MissingPolicy::Drop,
            fill_value: String::new(),
        }
    }
}

/// Why the sanitizer refused a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeDrop {
    /// Text value was null or empty after trimming, policy is `drop`.
    NullOrEmpty,
    /// The text column key is absent from this row.
    MissingColumn,
}

/// Outcome of sanitizing one row.
#[derive(Debug)]
pub enum SanitizeOutcome {
    Kept(Record),
    Dropped {
        original_index: u64,
        reason: SanitizeDrop,
    },
}

pub struct Sanitizer {
    options: SanitizeOptions,
    scrubber: PiiScrubber,
}

impl Sanitizer {
    pub fn new(options: SanitizeOptions) -> Self {
        Self {
            options,
            scrubber: PiiScrubber::new(),
        }
    }

    /// Sanitize a batch in parallel. Output order equals input order.
    pub fn sanitize_batch(
        &self,
        rows: Vec<(u64, RawRow)>,
        text_column: &str,
    ) -> Vec<SanitizeOutcome> {
        rows.into_par_iter()
            .map(|(index, row)| self.sanitize_row(index, row, text_column))
            .collect()
    }

    /// Sanitize a single row.
    pub fn sanitize_row(&self, index: u64, row: RawRow, text_column: &str) -> SanitizeOutcome {
        let mut values = row.values;
        let Some(raw_value) = values.remove(text_column) else {
            return SanitizeOutcome::Dropped {
                original_index: index,
                reason: SanitizeDrop::MissingColumn,
            };
        };

        let text = match value_to_text(&raw_value) {
            Some(t) => clean_text(&t),
            None => String::new(),
        };
        let mut text = if self.options.remove_pii {
            self.scrubber.scrub(&text)
        } else {
            text
        };

        if text.is_empty() {
            match self.options.missing {
                MissingPolicy::Drop => {
                    return SanitizeOutcome::Dropped {
                        original_index: index,
                        reason: SanitizeDrop::NullOrEmpty,
                    };
                }
                MissingPolicy::Fill => text = self.options.fill_value.clone(),
            }
        }

        if self.options.normalize_text {
            text = normalize_for_fingerprint(&text);
        }

        SanitizeOutcome::Kept(Record {
            original_index: index,
            text,
            extra: values,
        })
    }
}

/// Trim and collapse internal whitespace runs to a single space.
/// Casing is preserved; this is the emitted form.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

/// Normalized form used for fingerprinting: cleaned, lowercased, with runs
/// of terminal punctuation squeezed to a single mark.
pub fn normalize_for_fingerprint(text: &str) -> String {
    let cleaned = clean_text(text).to_lowercase();
    let mut out = String::with_capacity(cleaned.len());
    let mut last: Option<char> = None;
    for c in cleaned.chars() {
        if matches!(c, '!' | '?' | '.') && last == Some(c) {
            continue;
        }
        out.push(c);
        last = Some(c);
    }
    out
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Nested structures are not text; treat as missing.
        Value::Array(_) | Value::Object(_) => None,
    }
}
