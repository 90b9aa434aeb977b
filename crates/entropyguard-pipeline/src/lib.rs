//! # entropyguard-pipeline
//!
//! The streaming deduplication-and-sanitation engine. Stages run in order
//! over bounded batches — sanitize, chunk, fingerprint dedup, embed,
//! semantic dedup, validate — with cross-batch state carried by the
//! fingerprint map and the vector index.

pub mod chunk;
pub mod dedup;
pub mod engine;
pub mod guards;
pub mod sanitize;
pub mod validate;

pub use chunk::Chunker;
pub use dedup::embedder::{BatchedEmbedder, Embedder, HashingEmbedder};
pub use dedup::fingerprint::{fingerprint, FingerprintIndex, FingerprintOutcome};
pub use dedup::index::{similarity_to_radius, SearchHit, VectorIndex};
pub use engine::{PipelineEngine, RunReport};
pub use sanitize::{normalize_for_fingerprint, Sanitizer};
