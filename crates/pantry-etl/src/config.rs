// ETL Configuration
//
// Environment-driven settings with development defaults: both stores land
// in local SQLite files under ./data so the pipeline runs with no external
// services. Production points the URLs elsewhere.

use crate::{Result, DEFAULT_BATCH_LIMIT, DEFAULT_MAX_RETRIES};
use std::path::Path;

/// Configuration for one pipeline invocation
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Document store (raw + enriched collections)
    pub document_database_url: String,

    /// Relational analytics store (brands, categories, products, nutrition)
    pub analytics_database_url: String,

    /// Upper bound on enriched records pulled per load run
    pub batch_limit: i64,

    /// Retry budget for transient enrichment failures
    pub max_retries: u32,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            document_database_url: "sqlite://data/pantry_documents.db?mode=rwc".to_string(),
            analytics_database_url: "sqlite://data/pantry_analytics.db?mode=rwc".to_string(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl EtlConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DOCUMENT_DATABASE_URL`: document store connection URL
    /// - `ANALYTICS_DATABASE_URL`: relational store connection URL
    /// - `ETL_BATCH_LIMIT`: max enriched records per load run
    /// - `ENRICH_MAX_RETRIES`: enrichment retry budget
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DOCUMENT_DATABASE_URL") {
            config.document_database_url = url;
        }

        if let Ok(url) = std::env::var("ANALYTICS_DATABASE_URL") {
            config.analytics_database_url = url;
        }

        if let Ok(limit) = std::env::var("ETL_BATCH_LIMIT") {
            config.batch_limit = limit
                .parse()
                .map_err(|_| crate::EtlError::Config(format!("Invalid ETL_BATCH_LIMIT: {limit}")))?;
        }

        if let Ok(retries) = std::env::var("ENRICH_MAX_RETRIES") {
            config.max_retries = retries.parse().map_err(|_| {
                crate::EtlError::Config(format!("Invalid ENRICH_MAX_RETRIES: {retries}"))
            })?;
        }

        Ok(config)
    }

    /// Create the local data directory when the default SQLite URLs are used
    pub fn ensure_data_dir(&self) -> Result<()> {
        for url in [&self.document_database_url, &self.analytics_database_url] {
            if let Some(path) = url.strip_prefix("sqlite://") {
                let path = path.split('?').next().unwrap_or(path);
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
            }
        }
        Ok(())
    }
}
