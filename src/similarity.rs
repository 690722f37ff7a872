use rayon::prelude::*;

use crate::FEATURE_COUNT;
use crate::store::FeatureVector;

/// Default number of rows scored per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// One scored row from a ranking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub score: f64,
}

/// Rank every stored vector against `query` by cosine similarity.
///
/// Rows are scored in batches of `batch_size` (fanned out across the
/// rayon pool; per-row scores are independent, so the batch split never
/// changes a score). Results sort by descending score; equal scores
/// order by ascending row index, keeping rankings reproducible.
pub fn rank_against(
    vectors: &[FeatureVector],
    query: &FeatureVector,
    exclude: Option<usize>,
    batch_size: usize,
) -> Vec<Neighbor> {
    let batch = batch_size.max(1);

    let batches: Vec<Vec<Neighbor>> = vectors
        .par_chunks(batch)
        .enumerate()
        .map(|(chunk, rows)| {
            let base = chunk * batch;
            rows.iter()
                .enumerate()
                .map(|(offset, v)| Neighbor {
                    index: base + offset,
                    score: cosine_similarity(query, v),
                })
                .collect()
        })
        .collect();

    let mut neighbors: Vec<Neighbor> = batches.into_iter().flatten().collect();
    if let Some(skip) = exclude {
        neighbors.retain(|n| n.index != skip);
    }

    neighbors.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    neighbors
}

/// Cosine similarity between two vectors.
/// A zero (or numerically negligible) norm on either side scores 0.0
/// rather than dividing by zero.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        0.0
    } else {
        dot / denom
    }
}

/// Per-dimension z-score statistics fitted over a feature matrix.
///
/// Raw features mix scales (loudness in dB, tempo in BPM, the rest in
/// [0, 1]), which lets the large axes dominate cosine scores. Scaling
/// is opt-in: fit once over the stored matrix, then apply the same
/// statistics to stored and query vectors alike.
#[derive(Debug, Clone)]
pub struct FeatureScaling {
    means: FeatureVector,
    stds: FeatureVector,
}

impl FeatureScaling {
    /// Fit per-dimension mean and std over every row. Dimensions with
    /// near-zero spread keep a floor of 1e-10 so apply never divides
    /// by zero.
    pub fn fit(vectors: &[FeatureVector]) -> Self {
        let n = vectors.len();
        if n == 0 {
            return Self {
                means: [0.0; FEATURE_COUNT],
                stds: [1.0; FEATURE_COUNT],
            };
        }

        let mut means = [0.0_f64; FEATURE_COUNT];
        let mut vars = [0.0_f64; FEATURE_COUNT];

        for v in vectors {
            for (d, &val) in v.iter().enumerate() {
                means[d] += val;
            }
        }
        for m in &mut means {
            *m /= n as f64;
        }

        for v in vectors {
            for (d, &val) in v.iter().enumerate() {
                let diff = val - means[d];
                vars[d] += diff * diff;
            }
        }
        let mut stds = [0.0_f64; FEATURE_COUNT];
        for (d, var) in vars.iter().enumerate() {
            stds[d] = (var / n as f64).sqrt().max(1e-10);
        }

        Self { means, stds }
    }

    /// Z-score one vector: subtract mean, divide by std, per dimension.
    pub fn apply(&self, v: &FeatureVector) -> FeatureVector {
        let mut out = [0.0_f64; FEATURE_COUNT];
        for d in 0..FEATURE_COUNT {
            out[d] = (v[d] - self.means[d]) / self.stds[d];
        }
        out
    }

    /// Scale every row of a matrix.
    pub fn apply_all(&self, vectors: &[FeatureVector]) -> Vec<FeatureVector> {
        vectors.iter().map(|v| self.apply(v)).collect()
    }
}
