//! Integration-ID assignment (stage L2).
//!
//! Runs the constrained clusterer over all column embeddings, scores
//! every produced cluster count with the external silhouette scorer, and
//! rewrites column ids so matching columns across tables share an id.

use std::collections::{BTreeMap, HashMap};

use ndarray::Array1;
use thiserror::Error;

use crate::clustering::{cluster_columns, largest_per_table_count, ClusteringError};

/// Raised by a [`SilhouetteScorer`] when it cannot score an assignment
/// (fewer than two distinct labels, or one label per point).
#[derive(Debug, Error)]
#[error("silhouette rejected: {0}")]
pub struct SilhouetteRejected(pub String);

/// External cluster-quality scorer: `(points, labels) -> f32` in
/// `[-1, 1]`, higher is better. Consumed as a pure function.
pub trait SilhouetteScorer {
    fn score(&self, points: &[Array1<f32>], labels: &[usize]) -> Result<f32, SilhouetteRejected>;
}

/// Result of integration-id assignment.
#[derive(Debug, Clone)]
pub struct AlignmentOutcome {
    /// Pre-cluster integration id to final (cluster) integration id. An
    /// identity map when clustering was infeasible.
    pub assignments: HashMap<u64, u64>,
    /// Inclusive lower bound on cluster count (largest per-table column
    /// count).
    pub k_min: usize,
    /// Exclusive upper bound on cluster count (total column count).
    pub k_max: usize,
    /// The cluster count that won, or `None` when clustering was skipped.
    pub chosen_k: Option<usize>,
    /// Silhouette score per scored cluster count.
    pub silhouette_scores: BTreeMap<usize, f32>,
}

impl AlignmentOutcome {
    fn identity(pre_ids: &[u64], k_min: usize, k_max: usize) -> Self {
        Self {
            assignments: pre_ids.iter().map(|&id| (id, id)).collect(),
            k_min,
            k_max,
            chosen_k: None,
            silhouette_scores: BTreeMap::new(),
        }
    }
}

/// Assign final integration ids to columns.
///
/// `pre_ids`, `table_of`, and `embeddings` are parallel arrays describing
/// every column of every table: its globally-unique pre-cluster id, its
/// source table index, and its embedding vector.
///
/// When `k_min >= k_max` the clustering is vacuous (single table, or the
/// constraint admits no merge); pre-cluster ids are kept unchanged. When
/// the scorer rejects every produced count, the smallest produced count
/// wins. Silhouette ties break toward the lowest count.
pub fn align_columns<S: SilhouetteScorer>(
    pre_ids: &[u64],
    table_of: &[usize],
    embeddings: &[Array1<f32>],
    scorer: &S,
) -> Result<AlignmentOutcome, ClusteringError> {
    let n = embeddings.len();
    let k_min = largest_per_table_count(table_of);
    let k_max = n;

    if n == 0 {
        return Ok(AlignmentOutcome::identity(pre_ids, k_min, k_max));
    }
    if k_min >= k_max {
        tracing::warn!(
            k_min = k_min,
            k_max = k_max,
            "Clustering infeasible; keeping pre-cluster integration ids"
        );
        return Ok(AlignmentOutcome::identity(pre_ids, k_min, k_max));
    }

    let hierarchy = cluster_columns(embeddings, table_of, k_min)?;

    let mut silhouette_scores = BTreeMap::new();
    for (k, labels) in hierarchy.assignments() {
        match scorer.score(embeddings, labels) {
            Ok(score) => {
                silhouette_scores.insert(k, score);
            }
            Err(rejected) => {
                tracing::debug!(k = k, reason = %rejected, "Silhouette scorer rejected cluster count");
            }
        }
    }

    let chosen_k = match best_count(&silhouette_scores) {
        Some(k) => k,
        None => {
            let fallback = hierarchy
                .smallest_count()
                .expect("hierarchy from non-empty input has at least one count");
            tracing::warn!(
                fallback_k = fallback,
                "Every cluster count was rejected by the silhouette scorer; falling back"
            );
            fallback
        }
    };

    let labels = hierarchy
        .labels_for(chosen_k)
        .expect("chosen count was produced by the hierarchy");
    let assignments = pre_ids
        .iter()
        .zip(labels)
        .map(|(&pre_id, &label)| (pre_id, label as u64))
        .collect();

    tracing::debug!(
        chosen_k = chosen_k,
        scored = silhouette_scores.len(),
        "Integration ids assigned"
    );

    Ok(AlignmentOutcome {
        assignments,
        k_min,
        k_max,
        chosen_k: Some(chosen_k),
        silhouette_scores,
    })
}

/// Argmax over the silhouette map; ties break toward the lowest count.
fn best_count(scores: &BTreeMap<usize, f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (&k, &score) in scores {
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((k, score));
        }
    }
    best.map(|(k, _)| k)
}
