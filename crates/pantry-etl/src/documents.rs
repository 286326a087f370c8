// Document Store Access Layer
//
// The raw and enriched collections are consumed as a document interface:
// arbitrary JSON payloads, upsert-by-key, indexed status lookups. They are
// backed by two JSON-document tables on SQLite.
//
// Collection contracts:
// - products_raw: unique content hash; a re-collected snapshot with
//   identical payload content is rejected at write time.
// - products_enriched: unique raw_id; at most one current enrichment per
//   raw document, re-enrichment overwrites via upsert.

use crate::models::{EnrichedRecord, EnrichmentStatus, RawDocument};
use crate::Result;
use pantry_common::hash::content_hash;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

const COLLECTION_DDL: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS products_raw (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        content_hash TEXT NOT NULL UNIQUE,
        payload TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_raw_fetched_at ON products_raw (fetched_at)",
    r#"
    CREATE TABLE IF NOT EXISTS products_enriched (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        raw_id TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        enriched_at TEXT,
        document TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_enriched_status ON products_enriched (status)",
    "CREATE INDEX IF NOT EXISTS idx_products_raw_source ON products_raw (source)",
    "CREATE INDEX IF NOT EXISTS idx_products_enriched_enriched_at ON products_enriched (enriched_at)",
];

/// Handle on the raw and enriched document collections
#[derive(Clone)]
pub struct DocumentStore {
    db: SqlitePool,
}

impl DocumentStore {
    /// Wrap an existing pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Connect to the document database and ensure the collections exist.
    ///
    /// A single connection is enough: each pipeline invocation is one
    /// sequential batch writer.
    pub async fn connect(url: &str) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self::new(db);
        store.ensure_collections().await?;
        Ok(store)
    }

    /// Create collections and indexes if absent; never drops or alters
    pub async fn ensure_collections(&self) -> Result<()> {
        for statement in COLLECTION_DDL {
            sqlx::query(statement).execute(&self.db).await?;
        }
        Ok(())
    }

    /// Underlying pool, for callers sharing the connection
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    // ========================================================================
    // Raw collection
    // ========================================================================

    /// Insert one raw payload, stamped with its source and fetch time.
    ///
    /// Returns the content hash on insert, or `None` when an identical
    /// payload was already collected (dedup-at-write on the unique hash).
    pub async fn insert_raw(&self, payload: &Value, source: &str) -> Result<Option<String>> {
        let hash = content_hash(payload);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO products_raw (source, fetched_at, content_hash, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(source)
        .bind(crate::models::now_iso8601())
        .bind(&hash)
        .bind(payload.to_string())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 1 {
            Ok(Some(hash))
        } else {
            debug!(content_hash = %hash, "raw payload already collected, skipping");
            Ok(None)
        }
    }

    /// Insert a batch of raw payloads; duplicates are skipped silently.
    ///
    /// Returns the number actually inserted.
    pub async fn insert_raw_batch(&self, payloads: &[Value], source: &str) -> Result<usize> {
        let mut inserted = 0;
        for payload in payloads {
            if self.insert_raw(payload, source).await?.is_some() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// All raw documents, oldest first, for the enrichment stage
    pub async fn raw_documents_for_enrichment(&self) -> Result<Vec<RawDocument>> {
        let rows: Vec<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, source, fetched_at, content_hash, payload FROM products_raw ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for (id, source, fetched_at, hash, payload) in rows {
            documents.push(RawDocument {
                id,
                source,
                fetched_at,
                content_hash: hash,
                payload: serde_json::from_str(&payload)?,
            });
        }
        Ok(documents)
    }

    pub async fn count_raw(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products_raw")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    // ========================================================================
    // Enriched collection
    // ========================================================================

    /// Insert or replace the enrichment for a raw document (keyed by raw_id)
    pub async fn upsert_enriched(&self, record: &EnrichedRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products_enriched (raw_id, status, enriched_at, document)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (raw_id)
            DO UPDATE SET
                status = excluded.status,
                enriched_at = excluded.enriched_at,
                document = excluded.document
            "#,
        )
        .bind(&record.raw_id)
        .bind(record.status.as_str())
        .bind(&record.enriched_at)
        .bind(serde_json::to_string(record)?)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Upsert a batch of enrichments; records without a raw_id are skipped.
    ///
    /// Returns the number of records written.
    pub async fn upsert_enriched_batch(&self, records: &[EnrichedRecord]) -> Result<usize> {
        let mut written = 0;
        for record in records {
            if record.raw_id.is_empty() {
                continue;
            }
            self.upsert_enriched(record).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Enriched records filtered by status, bounded by `limit`
    pub async fn enriched_by_status(
        &self,
        status: EnrichmentStatus,
        limit: i64,
    ) -> Result<Vec<EnrichedRecord>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT document FROM products_enriched WHERE status = $1 ORDER BY id LIMIT $2",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for (document,) in rows {
            records.push(serde_json::from_str(&document)?);
        }
        Ok(records)
    }

    pub async fn count_enriched(&self, status: Option<EnrichmentStatus>) -> Result<i64> {
        let count: i64 = match status {
            Some(status) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM products_enriched WHERE status = $1")
                    .bind(status.as_str())
                    .fetch_one(&self.db)
                    .await?
            },
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM products_enriched")
                    .fetch_one(&self.db)
                    .await?
            },
        };
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductFacts;
    use serde_json::json;

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

    fn facts(code: &str) -> ProductFacts {
        ProductFacts {
            code: code.to_string(),
            product_name: "Test".to_string(),
            brand_name: "Brand".to_string(),
            category_name: "Snacks".to_string(),
            quality_score: 50,
            nutriscore_grade: "c".to_string(),
            nova_group: None,
            image_url: None,
            nutrition: None,
        }
    }

    #[tokio::test]
    async fn test_raw_insert_rejects_duplicate_content() {
        let store = memory_store().await;
        let payload = json!({"code": "123", "product_name": "Test"});

        let first = store.insert_raw(&payload, "openfoodfacts").await.unwrap();
        assert!(first.is_some());

        let second = store.insert_raw(&payload, "openfoodfacts").await.unwrap();
        assert!(second.is_none());
        assert_eq!(store.count_raw().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_raw_dedup_ignores_key_order() {
        let store = memory_store().await;
        let a: Value = serde_json::from_str(r#"{"code": "1", "name": "x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"name": "x", "code": "1"}"#).unwrap();

        assert!(store.insert_raw(&a, "openfoodfacts").await.unwrap().is_some());
        assert!(store.insert_raw(&b, "openfoodfacts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_batch_counts_only_new_documents() {
        let store = memory_store().await;
        let payloads = vec![
            json!({"code": "1"}),
            json!({"code": "2"}),
            json!({"code": "1"}),
        ];

        let inserted = store
            .insert_raw_batch(&payloads, "openfoodfacts")
            .await
            .unwrap();
        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn test_raw_documents_round_trip_payload() {
        let store = memory_store().await;
        let payload = json!({"code": "123", "nutriments": {"fat_100g": 1.5}});
        store.insert_raw(&payload, "openfoodfacts").await.unwrap();

        let docs = store.raw_documents_for_enrichment().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].payload, payload);
        assert_eq!(docs[0].source, "openfoodfacts");
        assert_eq!(docs[0].content_hash, content_hash(&payload));
    }

    #[tokio::test]
    async fn test_enriched_upsert_keeps_one_record_per_raw_id() {
        let store = memory_store().await;

        let record = EnrichedRecord::success("7".to_string(), facts("123"));
        store.upsert_enriched(&record).await.unwrap();

        let replacement =
            EnrichedRecord::failed("7".to_string(), "field_type".to_string(), "boom".to_string());
        store.upsert_enriched(&replacement).await.unwrap();

        assert_eq!(store.count_enriched(None).await.unwrap(), 1);
        assert_eq!(
            store
                .count_enriched(Some(EnrichmentStatus::Failed))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_enriched_by_status_filters_and_limits() {
        let store = memory_store().await;

        for id in 0..5 {
            let record = EnrichedRecord::success(id.to_string(), facts(&format!("code-{id}")));
            store.upsert_enriched(&record).await.unwrap();
        }
        store
            .upsert_enriched(&EnrichedRecord::failed(
                "99".to_string(),
                "invalid_payload".to_string(),
                "bad".to_string(),
            ))
            .await
            .unwrap();

        let successes = store
            .enriched_by_status(EnrichmentStatus::Success, 3)
            .await
            .unwrap();
        assert_eq!(successes.len(), 3);
        assert!(successes
            .iter()
            .all(|r| r.status == EnrichmentStatus::Success));

        let all_successes = store
            .enriched_by_status(EnrichmentStatus::Success, 100)
            .await
            .unwrap();
        assert_eq!(all_successes.len(), 5);
    }
}
