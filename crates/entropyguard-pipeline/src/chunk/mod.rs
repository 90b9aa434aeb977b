//! Recursive, separator-aware text chunking.
//!
//! Long texts are cut into windows of at most `chunk_size` characters.
//! Cuts prefer separator boundaries, tried in order (paragraph break,
//! newline, space by default); segments a separator cannot shrink fall
//! through to the next one, and past the recursion cap (or at the
//! empty-string sentinel) a hard fixed-width split applies. Consecutive
//! chunks overlap by exactly `chunk_overlap` characters taken from the
//! tail of the previous chunk, so stripping each chunk's leading overlap
//! reconstructs the input text exactly.

use entropyguard_core::errors::{ProcessingError, ValidationError};
use entropyguard_core::types::Record;
use smallvec::SmallVec;

/// Maximum recursion depth before the hard-split fallback.
pub const MAX_SPLIT_DEPTH: usize = 128;

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: SmallVec<[String; 4]>,
}

impl Chunker {
    /// Build a chunker. `chunk_overlap` must be smaller than `chunk_size`;
    /// separator lists longer than the recursion cap cannot be honored.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ValidationError::InvalidChunking {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: separators.into(),
        })
    }

    /// Reject separator lists deeper than the recursion cap. Checked once
    /// at startup so the split path never has to error.
    pub fn check_separator_depth(&self) -> Result<(), ProcessingError> {
        if self.separators.len() > MAX_SPLIT_DEPTH {
            return Err(ProcessingError::ChunkerOverflow);
        }
        Ok(())
    }

    /// Split one text into overlapping chunks.
    ///
    /// Chunks are substrings of `text` except for the leading overlap
    /// carried over from the previous chunk. Empty input yields no chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let core_limit = self.core_limit();
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut segments: Vec<String> = Vec::new();
        self.collect_segments(text, &self.separators, 0, core_limit, &mut segments);

        let cores = merge_segments(&segments, core_limit);
        self.apply_overlap(cores)
    }

    /// Chunk a record into per-chunk records. Chunks inherit the parent's
    /// `original_index` and passthrough fields and are treated as
    /// independent rows downstream.
    pub fn chunk_record(&self, record: Record) -> Vec<Record> {
        let chunks = self.split_text(&record.text);
        match chunks.len() {
            0 => Vec::new(),
            1 => vec![record],
            _ => chunks
                .into_iter()
                .map(|text| Record {
                    original_index: record.original_index,
                    text,
                    extra: record.extra.clone(),
                })
                .collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Budget for new characters per chunk, leaving room for the overlap
    /// prefix so no emitted chunk exceeds `chunk_size`.
    fn core_limit(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    fn collect_segments(
        &self,
        text: &str,
        separators: &[String],
        depth: usize,
        core_limit: usize,
        out: &mut Vec<String>,
    ) {
        if char_len(text) <= core_limit {
            out.push(text.to_string());
            return;
        }
        let Some((sep, rest)) = separators.split_first() else {
            hard_split(text, core_limit, out);
            return;
        };
        if depth >= MAX_SPLIT_DEPTH || sep.is_empty() {
            hard_split(text, core_limit, out);
            return;
        }
        if !text.contains(sep.as_str()) {
            self.collect_segments(text, rest, depth + 1, core_limit, out);
            return;
        }
        // split_inclusive keeps each separator attached to its segment, so
        // segment concatenation reproduces the text exactly.
        for piece in text.split_inclusive(sep.as_str()) {
            if char_len(piece) <= core_limit {
                out.push(piece.to_string());
            } else {
                self.collect_segments(piece, rest, depth + 1, core_limit, out);
            }
        }
    }

    fn apply_overlap(&self, cores: Vec<String>) -> Vec<String> {
        if self.chunk_overlap == 0 || cores.len() <= 1 {
            return cores;
        }
        let mut chunks: Vec<String> = Vec::with_capacity(cores.len());
        for (i, core) in cores.iter().enumerate() {
            if i == 0 {
                chunks.push(core.clone());
                continue;
            }
            // Overlap is min(chunk_overlap, previous length) so the rule
            // stays invertible from the emitted chunks alone.
            let prev = &chunks[i - 1];
            let prev_len = char_len(prev);
            let take = self.chunk_overlap.min(prev_len);
            let tail_start = prev
                .char_indices()
                .nth(prev_len - take)
                .map_or(0, |(b, _)| b);
            let mut chunk = prev[tail_start..].to_string();
            chunk.push_str(core);
            chunks.push(chunk);
        }
        chunks
    }
}

/// Greedily merge consecutive segments up to `limit` characters.
fn merge_segments(segments: &[String], limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for seg in segments {
        let seg_len = char_len(seg);
        if current_len > 0 && current_len + seg_len > limit {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(seg);
        current_len += seg_len;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Fixed-width fallback split on character boundaries.
fn hard_split(text: &str, limit: usize, out: &mut Vec<String>) {
    let mut start = 0usize;
    let mut count = 0usize;
    for (byte_idx, _) in text.char_indices() {
        if count == limit {
            out.push(text[start..byte_idx].to_string());
            start = byte_idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(text[start..].to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Reconstruct the original text from overlapped chunks by stripping each
/// chunk's leading overlap. Used by tests to assert coverage.
pub fn reconstruct(chunks: &[String], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 || overlap == 0 {
            out.push_str(chunk);
        } else {
            let carried = overlap.min(chunks[i - 1].chars().count());
            let skip = chunk
                .char_indices()
                .nth(carried)
                .map_or(chunk.len(), |(b, _)| b);
            out.push_str(&chunk[skip..]);
        }
    }
    out
}
