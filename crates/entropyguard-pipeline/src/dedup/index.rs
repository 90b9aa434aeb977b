//! Incremental vector index over unit vectors, squared-L2 metric.
//!
//! Storage is a flat structure-of-arrays buffer: vector `i` occupies
//! `data[i*dim .. (i+1)*dim]`, so the scan walks memory sequentially and
//! parallelizes cleanly across rows. Ids are dense and equal to insertion
//! order; a reverse map carries each vector's `original_index`.
//!
//! Numeric contract: for unit vectors, d² = 2(1 − cos s). The user-facing
//! similarity threshold converts to a radius with `similarity_to_radius`,
//! which must NOT take a square root — the sqrt form is a historical bug
//! that loosens the radius and over-reports duplicates.

use entropyguard_core::errors::ProcessingError;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::embedder::ZERO_NORM_EPS;

/// Convert a cosine-similarity threshold into a squared-L2 radius.
///
/// `d² = 2(1 − s)` exactly; no square root.
pub fn similarity_to_radius(similarity: f64) -> f32 {
    (2.0 * (1.0 - similarity)) as f32
}

/// One search result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub dist_sq: f32,
    pub vector_id: u64,
    pub original_index: u64,
}

/// A duplicate equivalence class. `members` holds vector ids in ascending
/// order, so the canonical representative is `members[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub members: Vec<u64>,
}

impl DuplicateGroup {
    pub fn canonical(&self) -> u64 {
        self.members[0]
    }
}

/// Flat exact index. `store_vectors(false)` is accepted as a hint; this
/// backend needs the raw vectors to answer queries, so the hint is
/// recorded and reported but does not change storage.
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
    originals: Vec<u64>,
    store_vectors: bool,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            originals: Vec::new(),
            store_vectors: true,
        }
    }

    /// Record the storage hint. Returns `self` for builder-style use.
    pub fn store_vectors(mut self, store: bool) -> Self {
        self.store_vectors = store;
        self
    }

    pub fn stores_vectors(&self) -> bool {
        self.store_vectors
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn original_index_of(&self, vector_id: u64) -> Option<u64> {
        self.originals.get(vector_id as usize).copied()
    }

    /// Append vectors, assigning contiguous ids in input order. Rows with
    /// ‖v‖² < 1e-8 are skipped with a warning and get `None` instead of an
    /// id. Dimension mismatches reject the whole call.
    pub fn add(
        &mut self,
        vectors: &[Vec<f32>],
        original_indices: &[u64],
    ) -> Result<Vec<Option<u64>>, ProcessingError> {
        if vectors.len() != original_indices.len() {
            return Err(ProcessingError::IndexInsert {
                message: format!(
                    "{} vectors but {} row indices",
                    vectors.len(),
                    original_indices.len()
                ),
            });
        }
        let mut ids = Vec::with_capacity(vectors.len());
        for (v, &original) in vectors.iter().zip(original_indices) {
            if v.len() != self.dim {
                return Err(ProcessingError::IndexInsert {
                    message: format!("vector of dim {} in a {}-dim index", v.len(), self.dim),
                });
            }
            let norm_sq: f32 = v.iter().map(|x| x * x).sum();
            if norm_sq < ZERO_NORM_EPS {
                tracing::warn!(
                    original_index = original,
                    "skipping zero vector (norm below epsilon)"
                );
                ids.push(None);
                continue;
            }
            debug_assert!(
                (norm_sq - 1.0).abs() < 1e-2,
                "non-unit vector entering the index: ‖v‖² = {norm_sq}"
            );
            let id = self.originals.len() as u64;
            self.data.extend_from_slice(v);
            self.originals.push(original);
            ids.push(Some(id));
        }
        Ok(ids)
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Exact k-nearest search by squared L2, ascending. If the query is
    /// itself indexed, the first hit is the query at distance ~0. Row
    /// scans parallelize over rayon.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let n = self.len();
        if n == 0 || k == 0 || query.len() != self.dim {
            return Vec::new();
        }
        let mut hits: Vec<(f32, usize)> = (0..n)
            .into_par_iter()
            .map(|i| (dist_sq(self.row(i), query), i))
            .collect();

        let k = k.min(n);
        if hits.len() > k {
            hits.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0));
            hits.truncate(k);
        }
        hits.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter()
            .map(|(d, i)| SearchHit {
                dist_sq: d,
                vector_id: i as u64,
                original_index: self.originals[i],
            })
            .collect()
    }

    /// All duplicate groups at the given squared radius: union-find over
    /// every pair (i, j), i < j, with d²(vᵢ, vⱼ) ≤ `threshold_sq`.
    /// Groups and their members come back sorted, canonical first.
    pub fn find_duplicates(&self, threshold_sq: f32) -> Vec<DuplicateGroup> {
        let n = self.len();
        if n < 2 {
            return Vec::new();
        }

        let pairs: Vec<(usize, usize)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row_i = self.row(i);
                (i + 1..n)
                    .filter(move |&j| dist_sq(row_i, self.row(j)) <= threshold_sq)
                    .map(move |j| (i, j))
            })
            .collect();

        let mut uf = UnionFind::<usize>::new(n);
        for (i, j) in pairs {
            uf.union(i, j);
        }

        let labels = uf.into_labeling();
        let mut groups: FxHashMap<usize, Vec<u64>> = FxHashMap::default();
        for (i, label) in labels.into_iter().enumerate() {
            groups.entry(label).or_default().push(i as u64);
        }

        let mut out: Vec<DuplicateGroup> = groups
            .into_values()
            .filter(|members| members.len() > 1)
            .map(|mut members| {
                members.sort_unstable();
                DuplicateGroup { members }
            })
            .collect();
        out.sort_unstable_by_key(|g| g.canonical());
        out
    }
}

fn dist_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random unit vector.
    fn unit_vector(dim: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).max(1);
        let mut v: Vec<f32> = (0..dim)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64) as f32 - 0.5
            })
            .collect();
        let n: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= n;
        }
        v
    }

    #[test]
    fn threshold_conversion_has_no_square_root() {
        // 2 * (1 - 0.90) = 0.2; the sqrt regression would give ~0.447.
        assert!((similarity_to_radius(0.90) - 0.2).abs() < 1e-6);
        assert!((similarity_to_radius(0.95) - 0.1).abs() < 1e-6);
        let wrong = (2.0f64 * (1.0 - 0.90)).sqrt();
        assert!((wrong - 0.447).abs() < 1e-3);
        assert!((similarity_to_radius(0.90) as f64 - wrong).abs() > 1e-2);
    }

    #[test]
    fn add_assigns_dense_ids_across_batches() {
        let mut idx = VectorIndex::new(16);
        let batch1: Vec<Vec<f32>> = (0..3).map(|i| unit_vector(16, i)).collect();
        let batch2: Vec<Vec<f32>> = (3..5).map(|i| unit_vector(16, i)).collect();
        let ids1 = idx.add(&batch1, &[0, 1, 2]).unwrap();
        let ids2 = idx.add(&batch2, &[3, 4]).unwrap();
        assert_eq!(ids1, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(ids2, vec![Some(3), Some(4)]);
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.original_index_of(3), Some(3));
    }

    #[test]
    fn zero_vectors_are_skipped_with_no_id() {
        let mut idx = VectorIndex::new(8);
        let zero = vec![0.0f32; 8];
        let tiny = vec![1e-6f32; 8]; // norm² = 8e-12 < 1e-8
        let ok = unit_vector(8, 7);
        let ids = idx.add(&[zero, ok.clone(), tiny], &[0, 1, 2]).unwrap();
        assert_eq!(ids, vec![None, Some(0), None]);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn search_returns_self_first_with_squared_distances() {
        let mut idx = VectorIndex::new(32);
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| unit_vector(32, i + 100)).collect();
        idx.add(&vectors, &(0..10).collect::<Vec<u64>>()).unwrap();

        let hits = idx.search(&vectors[0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].vector_id, 0);
        assert!(hits[0].dist_sq < 1e-5);

        // Squared distance, not distance: compare against a manual d².
        let manual: f32 = vectors[0]
            .iter()
            .zip(&vectors[1])
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let hit1 = hits.iter().find(|h| h.vector_id == 1);
        if let Some(h) = hit1 {
            assert!((h.dist_sq - manual).abs() < 1e-4);
        }
    }

    #[test]
    fn search_clamps_k_to_index_size() {
        let mut idx = VectorIndex::new(8);
        let vectors: Vec<Vec<f32>> = (0..3).map(|i| unit_vector(8, i + 40)).collect();
        idx.add(&vectors, &[0, 1, 2]).unwrap();
        let hits = idx.search(&vectors[0], 10);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn identical_vectors_form_one_group() {
        let mut idx = VectorIndex::new(16);
        let v = unit_vector(16, 11);
        idx.add(&[v.clone(), v.clone(), v.clone()], &[0, 1, 2]).unwrap();
        let groups = idx.find_duplicates(0.1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
        assert_eq!(groups[0].canonical(), 0);
    }

    #[test]
    fn dissimilar_unit_vectors_do_not_group_at_tight_radius() {
        let mut idx = VectorIndex::new(64);
        let vectors: Vec<Vec<f32>> = (0..6).map(|i| unit_vector(64, i * 7 + 1)).collect();
        idx.add(&vectors, &(0..6).collect::<Vec<u64>>()).unwrap();
        // Random unit vectors in 64 dims sit near d² = 2; radius 0.1 is
        // far below that.
        assert!(idx.find_duplicates(0.1).is_empty());
    }

    #[test]
    fn radius_semantics_match_the_identity() {
        // Build two vectors at a known cosine: s = cos(theta).
        let dim = 4;
        let a = {
            let mut v = vec![0.0f32; dim];
            v[0] = 1.0;
            v
        };
        let s = 0.92f32;
        let b = {
            let mut v = vec![0.0f32; dim];
            v[0] = s;
            v[1] = (1.0 - s * s).sqrt();
            v
        };
        let mut idx = VectorIndex::new(dim);
        idx.add(&[a, b], &[0, 1]).unwrap();

        // d² = 2(1 - 0.92) = 0.16. A 0.90 threshold (radius 0.2) groups
        // them; a 0.95 threshold (radius 0.1) does not.
        assert_eq!(idx.find_duplicates(similarity_to_radius(0.90)).len(), 1);
        assert!(idx.find_duplicates(similarity_to_radius(0.95)).is_empty());
    }

    #[test]
    fn transitive_pairs_collapse_into_one_group() {
        // a~b and b~c within radius, a~c slightly outside: union-find
        // still yields one group.
        let dim = 3;
        let mk = |theta: f32| vec![theta.cos(), theta.sin(), 0.0];
        let a = mk(0.0);
        let b = mk(0.2);
        let c = mk(0.4);
        let mut idx = VectorIndex::new(dim);
        idx.add(&[a, b, c], &[0, 1, 2]).unwrap();

        // d²(a,b) = 2(1-cos 0.2) ≈ 0.0399; d²(a,c) ≈ 0.158.
        let groups = idx.find_duplicates(0.05);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn dimension_mismatch_rejects_insert() {
        let mut idx = VectorIndex::new(8);
        let err = idx.add(&[vec![1.0; 4]], &[0]).unwrap_err();
        assert!(matches!(err, ProcessingError::IndexInsert { .. }));
    }

    #[test]
    fn store_hint_is_recorded() {
        let idx = VectorIndex::new(8).store_vectors(false);
        assert!(!idx.stores_vectors());
    }
}
