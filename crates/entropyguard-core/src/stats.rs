//! Aggregate run statistics, computed incrementally by the orchestrator.

use serde::{Deserialize, Serialize};

/// Characters-per-token heuristic used for the savings estimate.
const CHARS_PER_TOKEN: f64 = 4.0;
/// USD per 1k tokens at the reference embedding-API price point. A display
/// figure, not a contract.
const USD_PER_1K_TOKENS: f64 = 0.000_13;

/// Counters for a single run. All counts are rows unless noted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub original_rows: u64,
    pub after_sanitization_rows: u64,
    pub after_chunking_rows: u64,
    pub after_exact_dedup_rows: u64,
    pub after_semantic_dedup_rows: u64,
    pub after_validation_rows: u64,
    pub final_rows: u64,
    pub exact_duplicates_removed: u64,
    pub semantic_duplicates_removed: u64,
    pub validation_dropped: u64,
    pub total_dropped: u64,
    /// Unicode scalar values dropped with their rows.
    pub total_dropped_chars: u64,
    pub estimated_api_savings_usd: f64,
}

impl PipelineStats {
    /// Account for one dropped row of `chars` scalar values.
    pub fn record_drop(&mut self, chars: usize) {
        self.total_dropped += 1;
        self.total_dropped_chars += chars as u64;
        self.estimated_api_savings_usd =
            (self.total_dropped_chars as f64 / CHARS_PER_TOKEN) / 1000.0 * USD_PER_1K_TOKENS;
    }

    /// Monotone thinning holds by construction; exposed for assertions.
    /// Chunking can multiply rows before stage 1, so the upper anchor is
    /// the post-chunking count, not the raw input count.
    pub fn is_monotone(&self) -> bool {
        self.final_rows <= self.after_exact_dedup_rows
            && self.after_exact_dedup_rows <= self.after_chunking_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savings_formula_matches_heuristic() {
        let mut s = PipelineStats::default();
        // 8000 chars dropped => 2000 tokens => 2 * 0.00013 USD
        for _ in 0..8 {
            s.record_drop(1000);
        }
        assert_eq!(s.total_dropped, 8);
        assert_eq!(s.total_dropped_chars, 8000);
        assert!((s.estimated_api_savings_usd - 0.00026).abs() < 1e-12);
    }

    #[test]
    fn monotone_check() {
        let s = PipelineStats {
            original_rows: 10,
            after_chunking_rows: 10,
            after_exact_dedup_rows: 8,
            final_rows: 6,
            ..Default::default()
        };
        assert!(s.is_monotone());

        let chunked = PipelineStats {
            original_rows: 1,
            after_chunking_rows: 13,
            after_exact_dedup_rows: 13,
            final_rows: 13,
            ..Default::default()
        };
        assert!(chunked.is_monotone());
    }
}
