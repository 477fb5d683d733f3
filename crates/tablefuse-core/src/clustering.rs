//! Constrained agglomerative clustering of column embeddings (stage L1).
//!
//! Bottom-up merging of column vectors under a hard constraint: two
//! columns of the same source table may never land in one cluster. The
//! clusterer records a full hierarchy of label assignments, one per
//! cluster count it visits, so the assigner (L2) can pick the count with
//! the best silhouette score afterwards.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array1;
use thiserror::Error;

/// Errors that can occur while clustering column embeddings.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("no embeddings to cluster")]
    EmptyInput,

    #[error("embedding count {points} does not match table-origin count {tables}")]
    LengthMismatch { points: usize, tables: usize },

    #[error("k_min {k_min} is below the largest per-table column count {required}")]
    InvalidKMin { k_min: usize, required: usize },
}

/// A working cluster: running center, member points, and the set of
/// source tables covered. `tables` is always exactly the projection of
/// `members` onto the table index.
#[derive(Debug, Clone)]
struct ColumnCluster {
    center: Array1<f32>,
    members: Vec<(usize, usize)>,
    tables: BTreeSet<usize>,
}

impl ColumnCluster {
    fn singleton(point_idx: usize, table_idx: usize, center: Array1<f32>) -> Self {
        Self {
            center,
            members: vec![(point_idx, table_idx)],
            tables: BTreeSet::from([table_idx]),
        }
    }

    /// Euclidean distance between centers, or `None` when the merge is
    /// forbidden because the clusters share a source table.
    fn distance_from(&self, other: &ColumnCluster) -> Option<f32> {
        if self.tables.intersection(&other.tables).next().is_some() {
            return None;
        }
        let diff = &self.center - &other.center;
        Some(diff.dot(&diff).sqrt())
    }

    /// Merge `other` into `self`: weighted-mean center, concatenated
    /// members, unioned table set.
    fn absorb(&mut self, other: ColumnCluster) {
        let n_self = self.members.len() as f32;
        let n_other = other.members.len() as f32;
        self.center =
            (&self.center * n_self + &other.center * n_other) / (n_self + n_other);
        self.members.extend(other.members);
        self.tables.extend(other.tables);
    }
}

/// Label assignments for every cluster count the descent visited.
#[derive(Debug, Clone, Default)]
pub struct ClusterHierarchy {
    labels: BTreeMap<usize, Vec<usize>>,
    truncated_at: Option<usize>,
}

impl ClusterHierarchy {
    /// Labels for a specific cluster count, if that count was produced.
    /// Each label is a cluster id in `[0, k)`.
    pub fn labels_for(&self, k: usize) -> Option<&[usize]> {
        self.labels.get(&k).map(Vec::as_slice)
    }

    /// All produced cluster counts with their labels, ascending.
    pub fn assignments(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.labels.iter().map(|(&k, labels)| (k, labels.as_slice()))
    }

    /// Smallest cluster count the constraint permitted.
    pub fn smallest_count(&self) -> Option<usize> {
        self.labels.keys().next().copied()
    }

    /// The cluster count at which the descent stopped early because no
    /// constraint-respecting merge remained, if it did.
    pub fn truncated_at(&self) -> Option<usize> {
        self.truncated_at
    }

    /// Number of produced cluster counts.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no cluster count was produced.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Cluster column embeddings bottom-up until `k_min` clusters remain,
/// forbidding merges that would place two columns of one table in the
/// same cluster.
///
/// `table_of[i]` gives the source table of `embeddings[i]`. Labels are
/// recorded for every cluster count from `N` down to the smallest count
/// the constraint permits (at least `k_min`); the label of a point is its
/// cluster's position in the working list at that count.
pub fn cluster_columns(
    embeddings: &[Array1<f32>],
    table_of: &[usize],
    k_min: usize,
) -> Result<ClusterHierarchy, ClusteringError> {
    if embeddings.is_empty() {
        return Err(ClusteringError::EmptyInput);
    }
    if embeddings.len() != table_of.len() {
        return Err(ClusteringError::LengthMismatch {
            points: embeddings.len(),
            tables: table_of.len(),
        });
    }
    let largest_table = largest_per_table_count(table_of);
    if k_min < largest_table {
        return Err(ClusteringError::InvalidKMin {
            k_min,
            required: largest_table,
        });
    }

    let n = embeddings.len();
    let mut clusters: Vec<ColumnCluster> = embeddings
        .iter()
        .zip(table_of)
        .enumerate()
        .map(|(idx, (center, &table))| ColumnCluster::singleton(idx, table, center.clone()))
        .collect();

    let mut hierarchy = ClusterHierarchy::default();

    while clusters.len() > k_min {
        hierarchy
            .labels
            .insert(clusters.len(), record_labels(&clusters, n));

        let Some((i, j)) = closest_pair(&clusters) else {
            tracing::warn!(
                clusters = clusters.len(),
                k_min = k_min,
                "No constraint-respecting merge remains; stopping cluster descent early"
            );
            hierarchy.truncated_at = Some(clusters.len());
            return Ok(hierarchy);
        };

        let other = clusters.remove(j);
        clusters[i].absorb(other);
    }

    hierarchy
        .labels
        .insert(clusters.len(), record_labels(&clusters, n));
    Ok(hierarchy)
}

/// Largest number of columns contributed by any single table.
pub fn largest_per_table_count(table_of: &[usize]) -> usize {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &table in table_of {
        *counts.entry(table).or_default() += 1;
    }
    counts.values().copied().max().unwrap_or(0)
}

/// Minimum finite-distance pair `(i, j)`, `i < j`. Ties break toward the
/// lowest `i`, then the lowest `j`.
fn closest_pair(clusters: &[ColumnCluster]) -> Option<(usize, usize)> {
    let mut best: Option<(f32, usize, usize)> = None;
    for i in 0..clusters.len() {
        for j in (i + 1)..clusters.len() {
            let Some(distance) = clusters[i].distance_from(&clusters[j]) else {
                continue;
            };
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (i, j))
}

fn record_labels(clusters: &[ColumnCluster], n: usize) -> Vec<usize> {
    let mut labels = vec![0usize; n];
    for (position, cluster) in clusters.iter().enumerate() {
        for &(point_idx, _) in &cluster.members {
            labels[point_idx] = position;
        }
    }
    labels
}
