//! Property coverage for the chunker: for arbitrary text and window
//! geometry, chunks respect the size bound and reconstruct the input.

use entropyguard_pipeline::chunk::{reconstruct, Chunker};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn chunks_bound_and_cover_arbitrary_text(
        text in "[a-zA-Z0-9 \\n]{0,2000}",
        chunk_size in 8usize..256,
        overlap_fraction in 0usize..100,
    ) {
        // Keep overlap strictly below chunk_size.
        let overlap = (chunk_size * overlap_fraction / 100).min(chunk_size - 1);
        let chunker = Chunker::new(
            chunk_size,
            overlap,
            vec!["\n\n".into(), "\n".into(), " ".into(), String::new()],
        )
        .unwrap();

        let chunks = chunker.split_text(&text);

        if text.is_empty() {
            prop_assert!(chunks.is_empty());
        } else {
            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                prop_assert!(
                    chunk.chars().count() <= chunk_size,
                    "chunk of {} chars exceeds budget {}",
                    chunk.chars().count(),
                    chunk_size
                );
            }
            prop_assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn pathological_unbroken_text_never_overflows(
        len in 1usize..4000,
        chunk_size in 4usize..64,
    ) {
        let text = "x".repeat(len);
        let chunker = Chunker::new(chunk_size, chunk_size / 4, vec![" ".into()]).unwrap();
        let chunks = chunker.split_text(&text);
        prop_assert!(!chunks.is_empty());
        for chunk in &chunks {
            prop_assert!(chunk.chars().count() <= chunk_size);
        }
        prop_assert_eq!(reconstruct(&chunks, chunk_size / 4), text);
    }
}
