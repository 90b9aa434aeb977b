//! Text -> unit-vector embedding.
//!
//! The pipeline depends on the `Embedder` trait only. `BatchedEmbedder`
//! wraps any backend with sub-batching and L2 normalization; a degenerate
//! input that embeds to (near-)zero stays a zero vector, which the
//! orchestrator treats as a post-sanitization drop. Backends must be
//! deterministic for a fixed identifier — vectors from different models
//! must never share an index.

use std::sync::Arc;

use entropyguard_core::errors::ProcessingError;
use rayon::prelude::*;
use xxhash_rust::xxh3::xxh3_64;

/// Squared-norm floor below which a vector counts as zero.
pub const ZERO_NORM_EPS: f32 = 1e-8;

/// Default embedding dimension for the built-in backend.
pub const DEFAULT_DIMENSION: usize = 384;

/// A deterministic, batch-oriented embedding backend.
pub trait Embedder: Send + Sync {
    /// Stable identifier (model name).
    fn id(&self) -> &str;
    fn dimension(&self) -> usize;
    /// Embed a batch. Must return one row per input, each of
    /// `dimension()` floats. Rows may be unnormalized; the caller
    /// normalizes.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProcessingError>;
}

impl std::fmt::Debug for dyn Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("id", &self.id())
            .field("dimension", &self.dimension())
            .finish()
    }
}

/// Squared L2 norm.
pub fn norm_sq(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum()
}

/// Whether `v` is the zero sentinel.
pub fn is_zero_vector(v: &[f32]) -> bool {
    norm_sq(v) < ZERO_NORM_EPS
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let n = norm_sq(v);
    if n >= ZERO_NORM_EPS {
        let inv = 1.0 / n.sqrt();
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}

/// Sub-batching + normalization wrapper around a backend.
pub struct BatchedEmbedder {
    backend: Arc<dyn Embedder>,
    sub_batch: usize,
}

impl BatchedEmbedder {
    pub fn new(backend: Arc<dyn Embedder>, sub_batch: usize) -> Self {
        Self {
            backend,
            sub_batch: sub_batch.max(1),
        }
    }

    pub fn id(&self) -> &str {
        self.backend.id()
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    /// Embed `texts` in bounded sub-batches and L2-normalize every row.
    /// Zero rows come back as zero (the drop sentinel).
    pub fn embed_normalized(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProcessingError> {
        let dim = self.backend.dimension();
        let mut out = Vec::with_capacity(texts.len());
        for sub in texts.chunks(self.sub_batch) {
            let mut vectors = self.backend.embed(sub)?;
            if vectors.len() != sub.len() {
                return Err(ProcessingError::Embedding {
                    message: format!(
                        "backend '{}' returned {} rows for {} inputs",
                        self.backend.id(),
                        vectors.len(),
                        sub.len()
                    ),
                });
            }
            for v in &mut vectors {
                if v.len() != dim {
                    return Err(ProcessingError::Embedding {
                        message: format!(
                            "backend '{}' returned a {}-dim row (expected {dim})",
                            self.backend.id(),
                            v.len()
                        ),
                    });
                }
                l2_normalize(v);
            }
            out.append(&mut vectors);
        }
        Ok(out)
    }
}

/// Built-in deterministic backend: feature hashing over token and bigram
/// xxh3 hashes. Cheap, offline, and pure — the default when no model
/// backend is configured, and the workhorse for tests. Token overlap maps
/// to cosine proximity, which is what the duplicate radius needs.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProcessingError> {
        let dim = self.dimension;
        Ok(texts
            .par_iter()
            .map(|text| {
                let mut v = vec![0.0f32; dim];
                let tokens: Vec<String> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                    .map(str::to_lowercase)
                    .collect();
                for token in &tokens {
                    bump(&mut v, xxh3_64(token.as_bytes()));
                }
                for pair in tokens.windows(2) {
                    let joined = format!("{} {}", pair[0], pair[1]);
                    bump(&mut v, xxh3_64(joined.as_bytes()));
                }
                v
            })
            .collect())
    }
}

fn bump(v: &mut [f32], hash: u64) {
    let bucket = (hash % v.len() as u64) as usize;
    let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
    v[bucket] += sign;
}

#[cfg(feature = "model2vec")]
pub use model2vec::Model2VecEmbedder;

#[cfg(feature = "model2vec")]
mod model2vec {
    use super::{Embedder, ProcessingError};
    use entropyguard_core::errors::ResourceError;
    use model2vec_rs::model::StaticModel;

    /// Static-embedding backend over a pretrained model2vec model.
    pub struct Model2VecEmbedder {
        model: StaticModel,
        id: String,
        dimension: usize,
    }

    impl Model2VecEmbedder {
        /// Load a pretrained model by id or local path.
        pub fn from_pretrained(model_id: &str) -> Result<Self, ResourceError> {
            let model = StaticModel::from_pretrained(model_id, None, None, None).map_err(|e| {
                ResourceError::EmbedderUnavailable {
                    backend: format!("{model_id}: {e}"),
                }
            })?;
            // The crate does not expose the dimension directly; probe once.
            let dimension = model.encode_single("dimension probe").len();
            Ok(Self {
                model,
                id: model_id.to_string(),
                dimension,
            })
        }
    }

    impl Embedder for Model2VecEmbedder {
        fn id(&self) -> &str {
            &self.id
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProcessingError> {
            Ok(texts.iter().map(|t| self.model.encode_single(t)).collect())
        }
    }
}
