// Pantry ETL - Food Product Enrichment and Load Pipeline
//
// This crate turns semi-structured food-product payloads collected from a
// public catalog into scored, categorized, relationally normalized records.
//
// Two batch stages, run sequentially per invocation:
// - Enrich: pure transform over each raw document (quality score, category
//   normalization, image selection, nutrition extraction), persisted back to
//   the document store keyed by raw document id.
// - Load: drain successfully enriched records and reconcile them into the
//   relational schema (brands, categories, products, nutrition_facts) inside
//   one transaction, deduplicating by business key.
//
// The upstream collection loop, the query API, and the dashboard live
// outside this crate; they only share the stores defined here.

pub mod config;
pub mod documents;
pub mod enricher;
pub mod load;
pub mod models;
pub mod pipeline;

// Re-export main types
pub use config::EtlConfig;
pub use documents::DocumentStore;
pub use enricher::Enricher;
pub use load::{LoadEngine, LoadStats};
pub use models::{
    EnrichedRecord, EnrichmentFailure, EnrichmentStatus, NutritionPer100g, ProductFacts,
    RawDocument,
};
pub use pipeline::{EnrichmentPipeline, PipelineStats};

// Scoring policy constants. The 50/50 split between nutriscore and data
// completeness is a tunable policy, not a law of nature.
pub const NUTRISCORE_COMPONENT_WEIGHT: f64 = 0.5;
pub const COMPLETENESS_COMPONENT_WEIGHT: f64 = 50.0;

/// Bounded retry attempts for transient enrichment failures
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Bounded batch size for a single load run
pub const DEFAULT_BATCH_LIMIT: i64 = 10_000;

// Column limits enforced before writes
pub const MAX_PRODUCT_NAME_LEN: usize = 500;
pub const MAX_LOOKUP_NAME_LEN: usize = 255;
pub const MAX_GRADE_LEN: usize = 1;

/// Result type for ETL operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Error types for the enrichment and load stages
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
