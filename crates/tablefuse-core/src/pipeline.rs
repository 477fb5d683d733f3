//! End-to-end full-disjunction pipeline and its statistics sidecar.
//!
//! Runs the four core stages in sequence:
//! embed columns (L0) -> cluster and assign integration ids (L1+L2) ->
//! outer union with labeled nulls (L3) -> complement to the fixed point
//! (L4) -> subsume and strip labels (L5).
//!
//! The pipeline never aborts on recoverable anomalies; it produces a
//! (possibly degraded) full disjunction plus a diagnostics record.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::alignment::{align_columns, SilhouetteScorer};
use crate::complement::complement;
use crate::embedding::{embed_table_columns, EmbeddingConfig, TextEncoder};
use crate::error::{Result, TableFuseError};
use crate::outer_union::outer_union;
use crate::subsume::subsume;
use crate::table::Table;
use crate::value::NullMinter;

/// Configuration for one integration run.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Column sampling configuration for the embedding stage.
    pub embedding: EmbeddingConfig,
    /// Cap on complementation passes before the run continues with the
    /// last iterate.
    pub max_complement_iterations: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            max_complement_iterations: 100,
        }
    }
}

impl IntegrationConfig {
    /// Config with a fixed embedding seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            embedding: EmbeddingConfig::with_seed(seed),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.sample_size == 0 {
            return Err(TableFuseError::Config(
                "embedding sample_size must be >= 1".to_string(),
            ));
        }
        if self.max_complement_iterations == 0 {
            return Err(TableFuseError::Config(
                "max_complement_iterations must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Elapsed milliseconds per pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub embed_ms: u64,
    pub align_ms: u64,
    pub union_ms: u64,
    pub complement_ms: u64,
    pub subsume_ms: u64,
}

/// Diagnostics record for one integration run, read by benchmark and
/// visualization consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Number of input tables.
    pub input_tables: usize,
    /// Total tuples across the input tables.
    pub input_tuples: usize,
    /// Tuples in the final full disjunction.
    pub output_tuples: usize,
    /// Inclusive lower bound on cluster count.
    pub k_min: usize,
    /// Exclusive upper bound on cluster count.
    pub k_max: usize,
    /// The winning cluster count, or `None` when clustering was skipped.
    pub chosen_k: Option<usize>,
    /// Silhouette score per scored cluster count.
    pub silhouette_scores: BTreeMap<usize, f32>,
    /// Complementation passes executed.
    pub complement_iterations: usize,
    /// False when the complement iteration cap was hit.
    pub complement_converged: bool,
    /// Labeled nulls minted across generation and union filling.
    pub labeled_nulls_minted: u64,
    pub timings: StageTimings,
}

impl IntegrationStats {
    /// Serialize the sidecar as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A finished integration: the full-disjunction table and its
/// diagnostics.
#[derive(Debug, Clone)]
pub struct Integration {
    pub table: Table,
    pub stats: IntegrationStats,
}

/// The full-disjunction integrator, parameterized over the two external
/// collaborators: a text encoder and a silhouette scorer.
#[derive(Debug)]
pub struct Integrator<E, S> {
    encoder: E,
    scorer: S,
    config: IntegrationConfig,
}

impl<E: TextEncoder + Sync, S: SilhouetteScorer> Integrator<E, S> {
    /// Integrator with the default configuration.
    pub fn new(encoder: E, scorer: S) -> Self {
        Self::with_config(encoder, scorer, IntegrationConfig::default())
    }

    /// Integrator with an explicit configuration.
    pub fn with_config(encoder: E, scorer: S, config: IntegrationConfig) -> Self {
        Self {
            encoder,
            scorer,
            config,
        }
    }

    /// Compute the full disjunction of the input tables.
    ///
    /// Inputs are immutable; the integrator works on clones. An empty
    /// input set is reported and yields an empty full disjunction rather
    /// than an error.
    pub fn integrate(&self, tables: &[Table]) -> Result<Integration> {
        self.config.validate()?;
        let started_at = Utc::now();

        if tables.is_empty() {
            tracing::error!("No input tables; returning an empty full disjunction");
            return Ok(Integration {
                table: Table::empty("full_disjunction"),
                stats: IntegrationStats {
                    started_at,
                    completed_at: Utc::now(),
                    input_tables: 0,
                    input_tuples: 0,
                    output_tuples: 0,
                    k_min: 0,
                    k_max: 0,
                    chosen_k: None,
                    silhouette_scores: BTreeMap::new(),
                    complement_iterations: 0,
                    complement_converged: true,
                    labeled_nulls_minted: 0,
                    timings: StageTimings::default(),
                },
            });
        }

        let input_tuples: usize = tables.iter().map(Table::tuple_count).sum();
        tracing::debug!(
            tables = tables.len(),
            tuples = input_tuples,
            "Starting integration"
        );

        // Pre-cluster integration ids, globally unique across tables.
        let mut working: Vec<Table> = tables.to_vec();
        let mut offset = 0u64;
        for table in &mut working {
            offset = table.offset_integration_ids(offset);
        }

        // L0: embed every column of every table.
        let embed_start = Instant::now();
        let mut pre_ids: Vec<u64> = Vec::new();
        let mut table_of: Vec<usize> = Vec::new();
        let mut embeddings: Vec<Array1<f32>> = Vec::new();
        for (table_idx, table) in working.iter().enumerate() {
            for (id, vector) in
                embed_table_columns(&self.encoder, table, &self.config.embedding)?
            {
                pre_ids.push(id);
                table_of.push(table_idx);
                embeddings.push(vector);
            }
        }
        let embed_ms = elapsed_ms(embed_start);

        // L1 + L2: cluster embeddings and rewrite integration ids.
        let align_start = Instant::now();
        let alignment = align_columns(&pre_ids, &table_of, &embeddings, &self.scorer)?;
        for table in &mut working {
            table.rename_columns(&alignment.assignments);
        }
        let align_ms = elapsed_ms(align_start);

        // L3: labeled nulls, then fold the outer union.
        let union_start = Instant::now();
        let mut minter = NullMinter::new();
        let mut disjunction = Table::empty("full_disjunction");
        for table in &mut working {
            table.generate_labeled_nulls(&mut minter);
            disjunction = outer_union(&disjunction, table, &mut minter);
        }
        let union_ms = elapsed_ms(union_start);
        tracing::debug!(
            columns = disjunction.columns().len(),
            tuples = disjunction.tuple_count(),
            "Outer union complete"
        );

        // L4: complement to the fixed point.
        let complement_start = Instant::now();
        let complemented = complement(&disjunction, self.config.max_complement_iterations);
        let complement_ms = elapsed_ms(complement_start);

        // L5: subsumption and labeled-null replacement.
        let subsume_start = Instant::now();
        let full_disjunction = subsume(&complemented.table);
        let subsume_ms = elapsed_ms(subsume_start);

        let stats = IntegrationStats {
            started_at,
            completed_at: Utc::now(),
            input_tables: tables.len(),
            input_tuples,
            output_tuples: full_disjunction.tuple_count(),
            k_min: alignment.k_min,
            k_max: alignment.k_max,
            chosen_k: alignment.chosen_k,
            silhouette_scores: alignment.silhouette_scores,
            complement_iterations: complemented.iterations,
            complement_converged: complemented.converged,
            labeled_nulls_minted: minter.minted(),
            timings: StageTimings {
                embed_ms,
                align_ms,
                union_ms,
                complement_ms,
                subsume_ms,
            },
        };

        tracing::debug!(
            output_tuples = stats.output_tuples,
            chosen_k = ?stats.chosen_k,
            "Integration complete"
        );

        Ok(Integration {
            table: full_disjunction,
            stats,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::SilhouetteRejected;
    use crate::table::ColumnType;
    use crate::value::Value;
    use std::collections::HashSet;

    /// Dimension-2 encoder keyed by first byte, good enough to separate
    /// short test strings.
    struct ByteEncoder;

    impl TextEncoder for ByteEncoder {
        fn dimension(&self) -> usize {
            2
        }

        fn encode(&self, text: &str) -> Array1<f32> {
            let first = text.bytes().next().unwrap_or(0) as f32;
            Array1::from(vec![first / 255.0, 1.0 - first / 255.0])
        }
    }

    /// Rejects degenerate assignments, otherwise scores every count the
    /// same so ties resolve to the smallest.
    struct FlatScorer;

    impl SilhouetteScorer for FlatScorer {
        fn score(&self, points: &[Array1<f32>], labels: &[usize]) -> std::result::Result<f32, SilhouetteRejected> {
            let distinct: HashSet<usize> = labels.iter().copied().collect();
            if distinct.len() < 2 || distinct.len() == points.len() {
                return Err(SilhouetteRejected("degenerate assignment".into()));
            }
            Ok(0.0)
        }
    }

    fn integrator() -> Integrator<ByteEncoder, FlatScorer> {
        Integrator::with_config(ByteEncoder, FlatScorer, IntegrationConfig::with_seed(42))
    }

    #[test]
    fn test_empty_input_yields_empty_disjunction() {
        let result = integrator().integrate(&[]).unwrap();
        assert_eq!(result.table.tuple_count(), 0);
        assert_eq!(result.stats.input_tables, 0);
        assert_eq!(result.stats.output_tuples, 0);
    }

    #[test]
    fn test_single_table_keeps_ids_and_still_complements() {
        let table = Table::new(
            "people",
            vec![
                ("name".to_string(), ColumnType::Str),
                ("score".to_string(), ColumnType::Int),
            ],
            vec![
                vec![Value::from("A"), Value::Null],
                vec![Value::Null, Value::from(1)],
                vec![Value::from("A"), Value::from(1)],
            ],
        );
        let result = integrator().integrate(&[table]).unwrap();

        assert_eq!(result.stats.chosen_k, None);
        assert_eq!(result.stats.k_min, result.stats.k_max);
        assert_eq!(result.table.tuple_count(), 1);
        assert_eq!(
            result.table.rows()[0],
            vec![Value::from("A"), Value::from(1)]
        );
        assert!(!result.table.has_labeled_nulls());
        assert_eq!(result.stats.input_tuples, 3);
        assert_eq!(result.stats.output_tuples, 1);
        assert!(result.stats.complement_converged);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = IntegrationConfig {
            max_complement_iterations: 0,
            ..IntegrationConfig::with_seed(1)
        };
        let runner = Integrator::with_config(ByteEncoder, FlatScorer, config);
        let result = runner.integrate(&[]);
        assert!(matches!(result, Err(TableFuseError::Config(_))));
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let result = integrator().integrate(&[]).unwrap();
        let json = result.stats.to_json().unwrap();
        assert!(json.contains("output_tuples"));
        assert!(json.contains("timings"));
    }
}
