//! Stage-1 exact deduplication by fingerprint.
//!
//! A fingerprint is the xxh3 64-bit hash of the normalized text. Equal
//! fingerprints collapse into one group; hash collisions are accepted as
//! duplicates (the false-positive cost at 10^6 rows is negligible). The
//! map lives for the whole run so cross-batch duplicates are caught.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

/// Hash normalized text into its 64-bit fingerprint.
pub fn fingerprint(normalized_text: &str) -> u64 {
    xxh3_64(normalized_text.as_bytes())
}

/// Outcome of offering a fingerprint to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintOutcome {
    /// First sighting; the row is canonical for this fingerprint.
    Inserted,
    /// Seen before; carries the canonical row's `original_index`.
    Duplicate { canonical: u64 },
}

/// Process-wide fingerprint -> first-seen `original_index` map.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    map: FxHashMap<u64, u64>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// First-wins insert: an existing entry is never displaced.
    pub fn check_insert(&mut self, fp: u64, original_index: u64) -> FingerprintOutcome {
        match self.map.entry(fp) {
            std::collections::hash_map::Entry::Occupied(e) => FingerprintOutcome::Duplicate {
                canonical: *e.get(),
            },
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(original_index);
                FingerprintOutcome::Inserted
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
