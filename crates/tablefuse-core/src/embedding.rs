//! Column embedding adapter (pipeline stage L0).
//!
//! Maps a column (its sampled values) to a fixed-dimension vector by
//! averaging text embeddings of the sampled values. The text encoder
//! itself is an external collaborator consumed through the [`TextEncoder`]
//! trait; this module owns only the sampling and averaging policy.

use ndarray::Array1;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

use crate::table::Table;
use crate::value::Value;

/// Errors that can occur while embedding columns.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("encoder returned a vector of dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// External text encoder: `text -> unit-normalized Vector<f32, D>`.
///
/// Deterministic per instance; the dimension `D` is fixed by the encoder
/// (typically 384 for sentence transformers).
pub trait TextEncoder {
    /// Output dimension of every encoded vector.
    fn dimension(&self) -> usize;

    /// Encode one string.
    fn encode(&self, text: &str) -> Array1<f32>;
}

/// Configuration for column embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Maximum number of non-null values sampled per column.
    pub sample_size: usize,
    /// Optional seed for the sampling RNG. With a seed, embeddings are
    /// reproducible regardless of parallel scheduling; without one, each
    /// column samples from an entropy-seeded stream.
    pub seed: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            seed: None,
        }
    }
}

impl EmbeddingConfig {
    /// Config with a fixed sampling seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

/// Embed one column from its cell values.
///
/// Samples up to `sample_size` values without replacement by sorting with
/// a key that places null-like cells last and otherwise is a uniform
/// `[0,1)` draw, then returns the arithmetic mean of the encoded string
/// forms. A column with no non-null values gets the mean of a zero vector
/// and a uniform `[-1,1)` noise vector.
pub fn embed_column<E: TextEncoder>(
    encoder: &E,
    values: &[&Value],
    sample_size: usize,
    rng: &mut SmallRng,
) -> Result<Array1<f32>, EmbeddingError> {
    let dim = encoder.dimension();

    let mut keyed: Vec<(f64, &Value)> = values
        .iter()
        .map(|v| {
            let key = if v.is_null_like() { 1.0 } else { rng.gen::<f64>() };
            (key, *v)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut sum = Array1::<f32>::zeros(dim);
    let mut count = 0usize;
    for (_, value) in keyed.into_iter().take(sample_size) {
        let Some(text) = value.as_text() else {
            continue;
        };
        let embedded = encoder.encode(&text);
        if embedded.len() != dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                actual: embedded.len(),
            });
        }
        sum += &embedded;
        count += 1;
    }

    if count > 0 {
        Ok(sum / count as f32)
    } else {
        let noise = Array1::from_shape_fn(dim, |_| rng.gen_range(-1.0f32..1.0));
        Ok((sum + noise) / 2.0)
    }
}

/// Embed every column of a table, in parallel across columns.
///
/// Returns `(integration_id, vector)` pairs in column order. Each column
/// draws from its own RNG stream keyed by the config seed and the
/// column's integration id, so the parallel schedule cannot perturb the
/// result.
pub fn embed_table_columns<E: TextEncoder + Sync>(
    encoder: &E,
    table: &Table,
    config: &EmbeddingConfig,
) -> Result<Vec<(u64, Array1<f32>)>, EmbeddingError> {
    table
        .columns()
        .par_iter()
        .enumerate()
        .map(|(idx, col)| {
            let mut rng = column_rng(config.seed, col.id);
            let values: Vec<&Value> = table.rows().iter().map(|row| &row[idx]).collect();
            let vector = embed_column(encoder, &values, config.sample_size, &mut rng)?;
            Ok((col.id, vector))
        })
        .collect()
}

fn column_rng(seed: Option<u64>, column_id: u64) -> SmallRng {
    match seed {
        Some(seed) => {
            SmallRng::seed_from_u64(seed ^ column_id.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => SmallRng::from_entropy(),
    }
}
