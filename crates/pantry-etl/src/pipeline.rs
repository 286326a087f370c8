// Enrichment Pipeline Orchestration
//
// Batch driver for the enrichment stage: fetch every collected raw
// document, run the pure transform over each, and upsert the resulting
// records back into the enriched collection keyed by raw document id.
//
// Failed enrichments are recorded, not raised; re-running the stage
// re-enriches every document and overwrites its previous record.

use crate::documents::DocumentStore;
use crate::enricher::Enricher;
use crate::models::EnrichmentStatus;
use crate::Result;
use tracing::info;

/// Enrichment run statistics
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Raw documents processed
    pub processed: usize,
    /// Records enriched successfully
    pub succeeded: usize,
    /// Records marked failed after exhausting retries
    pub failed: usize,
}

/// Batch enrichment pipeline over the document store
pub struct EnrichmentPipeline {
    documents: DocumentStore,
    enricher: Enricher,
}

impl EnrichmentPipeline {
    /// Create a pipeline with the default enricher
    pub fn new(documents: DocumentStore) -> Self {
        Self {
            documents,
            enricher: Enricher::new(),
        }
    }

    /// Create a pipeline with a custom-configured enricher
    pub fn with_enricher(documents: DocumentStore, enricher: Enricher) -> Self {
        Self {
            documents,
            enricher,
        }
    }

    /// Enrich every raw document and persist the outcomes.
    ///
    /// Each document yields exactly one record; the per-document transform
    /// never aborts the batch.
    pub async fn run(&self) -> Result<PipelineStats> {
        info!("Starting enrichment run");

        let raw_documents = self.documents.raw_documents_for_enrichment().await?;
        info!("Fetched {} raw documents", raw_documents.len());

        let mut records = Vec::with_capacity(raw_documents.len());
        let mut succeeded = 0;
        let mut failed = 0;

        for document in &raw_documents {
            let record = self.enricher.enrich(document);
            match record.status {
                EnrichmentStatus::Success => succeeded += 1,
                _ => failed += 1,
            }
            records.push(record);
        }

        self.documents.upsert_enriched_batch(&records).await?;

        let stats = PipelineStats {
            processed: raw_documents.len(),
            succeeded,
            failed,
        };
        info!(
            "Enrichment run completed: {} succeeded, {} failed",
            stats.succeeded, stats.failed
        );
        Ok(stats)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> DocumentStore {
        let db = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = DocumentStore::new(db);
        store.ensure_collections().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_run_enriches_every_raw_document() {
        let store = memory_store().await;
        store
            .insert_raw(&json!({"code": "1", "nutriscore_grade": "a", "completeness": 1.0}), "test")
            .await
            .unwrap();
        store
            .insert_raw(&json!({"code": "2", "completeness": "broken"}), "test")
            .await
            .unwrap();

        let pipeline = EnrichmentPipeline::new(store.clone());
        let stats = pipeline.run().await.unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);

        assert_eq!(
            store
                .count_enriched(Some(EnrichmentStatus::Success))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count_enriched(Some(EnrichmentStatus::Failed))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_rerun_overwrites_instead_of_duplicating() {
        let store = memory_store().await;
        store
            .insert_raw(&json!({"code": "1", "product_name": "Test"}), "test")
            .await
            .unwrap();

        let pipeline = EnrichmentPipeline::new(store.clone());
        pipeline.run().await.unwrap();
        pipeline.run().await.unwrap();

        assert_eq!(store.count_enriched(None).await.unwrap(), 1);
    }
}
