//! TableFuse Core - full-disjunction integration over heterogeneous
//! relational tables.
//!
//! This crate provides:
//! - Table and cell-value types with labeled-null support
//! - Column alignment via constrained agglomerative clustering of
//!   column embeddings
//! - Outer union, fixed-point complementation, and subsumption
//! - The end-to-end `Integrator` pipeline with a statistics sidecar

pub mod alignment;
pub mod clustering;
pub mod complement;
pub mod embedding;
pub mod error;
pub mod outer_union;
pub mod pipeline;
pub mod subsume;
pub mod table;
pub mod value;

pub use error::{Result, TableFuseError};
pub use pipeline::{Integration, IntegrationConfig, IntegrationStats, Integrator};
pub use table::{Column, ColumnType, Table};
pub use value::{NullMinter, Value};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::alignment::{SilhouetteRejected, SilhouetteScorer};
    pub use crate::embedding::{EmbeddingConfig, TextEncoder};
    pub use crate::error::TableFuseError;
    pub use crate::pipeline::{Integration, IntegrationConfig, IntegrationStats, Integrator};
    pub use crate::table::{Column, ColumnType, Table};
    pub use crate::value::{NullMinter, Value};
}
