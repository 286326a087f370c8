// Reconciliation / Load Engine
//
// Drains successfully enriched records from the document store and
// materializes them into the relational schema (brands, categories,
// products, nutrition_facts) without duplication.
//
// One transaction per run: either the whole batch's relational effects
// commit, or none do. Brand and category lookups are served by per-run
// in-memory caches so a batch of thousands of products sharing a handful of
// names costs at most one lookup-or-create round trip per distinct name.

use crate::documents::DocumentStore;
use crate::models::{now_iso8601, EnrichedRecord, EnrichmentStatus, NutritionPer100g};
use crate::{Result, DEFAULT_BATCH_LIMIT, MAX_GRADE_LEN, MAX_LOOKUP_NAME_LEN, MAX_PRODUCT_NAME_LEN};
use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::{error, info};

const SCHEMA_DDL: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS brands (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        product_name TEXT NOT NULL,
        brand_id INTEGER REFERENCES brands (id),
        category_id INTEGER REFERENCES categories (id),
        nutriscore_grade TEXT,
        nova_group INTEGER,
        quality_score INTEGER,
        image_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    // Serves the common "best products by grade" query
    "CREATE INDEX IF NOT EXISTS idx_nutriscore_quality ON products (nutriscore_grade, quality_score)",
    "CREATE INDEX IF NOT EXISTS idx_products_quality ON products (quality_score)",
    r#"
    CREATE TABLE IF NOT EXISTS nutrition_facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL UNIQUE REFERENCES products (id),
        energy_kcal REAL,
        fat REAL,
        saturated_fat REAL,
        carbohydrates REAL,
        sugars REAL,
        fiber REAL,
        proteins REAL,
        salt REAL
    )
    "#,
];

/// Load run statistics
#[derive(Debug, Clone)]
pub struct LoadStats {
    /// Enriched records pulled from the document store
    pub extracted: usize,
    /// Products staged and committed
    pub loaded: usize,
    /// Records dropped for lacking a business key
    pub skipped: usize,
}

/// Per-run lookup caches; never reused across runs
#[derive(Default)]
struct RunCaches {
    brands: HashMap<String, i64>,
    categories: HashMap<String, i64>,
}

/// Reconciliation engine over the relational store
pub struct LoadEngine {
    documents: DocumentStore,
    db: SqlitePool,
    batch_limit: i64,
}

impl LoadEngine {
    /// Create a load engine with the default batch bound
    pub fn new(documents: DocumentStore, db: SqlitePool) -> Self {
        Self {
            documents,
            db,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Create a load engine with a custom batch bound
    pub fn with_batch_limit(documents: DocumentStore, db: SqlitePool, batch_limit: i64) -> Self {
        Self {
            documents,
            db,
            batch_limit,
        }
    }

    /// Create relational tables and indexes if absent; never drops or alters
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA_DDL {
            sqlx::query(statement).execute(&self.db).await?;
        }
        Ok(())
    }

    /// Run one full load: extract success records, reconcile each into the
    /// relational schema, commit once.
    ///
    /// Any failure rolls back the entire run and is propagated; the
    /// relational store is left exactly as before. Idempotent: re-running
    /// over the same batch leaves the tables in the same final state
    /// (`created_at` keeps its first-insert value).
    pub async fn run(&self) -> Result<LoadStats> {
        info!("Starting load run");

        self.ensure_schema().await?;

        let records = self
            .documents
            .enriched_by_status(EnrichmentStatus::Success, self.batch_limit)
            .await?;
        info!("Extracted {} enriched records", records.len());

        let mut tx = self.db.begin().await?;
        let mut caches = RunCaches::default();

        let loaded = match Self::load_batch(&mut tx, &mut caches, &records).await {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(error = %err, "load run failed, rolling back");
                tx.rollback().await?;
                return Err(err);
            },
        };

        tx.commit().await?;

        let stats = LoadStats {
            extracted: records.len(),
            loaded,
            skipped: records.len() - loaded,
        };
        info!(
            "Load run committed: {} loaded, {} skipped",
            stats.loaded, stats.skipped
        );
        Ok(stats)
    }

    async fn load_batch(
        tx: &mut Transaction<'_, Sqlite>,
        caches: &mut RunCaches,
        records: &[EnrichedRecord],
    ) -> Result<usize> {
        let mut loaded = 0;
        for record in records {
            if Self::load_product(tx, caches, record).await? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Stage one product (and its lookup entities) inside the run's
    /// transaction. Returns false when the record has no business key.
    async fn load_product(
        tx: &mut Transaction<'_, Sqlite>,
        caches: &mut RunCaches,
        record: &EnrichedRecord,
    ) -> Result<bool> {
        let Some(data) = record.data.as_ref() else {
            return Ok(false);
        };
        if data.code.is_empty() {
            return Ok(false);
        }

        let brand_id = Self::get_or_create_brand(tx, caches, &data.brand_name).await?;
        let category_id = Self::get_or_create_category(tx, caches, &data.category_name).await?;

        let product_name = truncate_chars(&data.product_name, MAX_PRODUCT_NAME_LEN);
        let grade = truncate_chars(&data.nutriscore_grade, MAX_GRADE_LEN);

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE code = $1")
            .bind(&data.code)
            .fetch_optional(&mut **tx)
            .await?;

        let product_id = match existing {
            Some(product_id) => {
                sqlx::query(
                    r#"
                    UPDATE products
                    SET product_name = $1,
                        brand_id = $2,
                        category_id = $3,
                        nutriscore_grade = $4,
                        nova_group = $5,
                        quality_score = $6,
                        image_url = $7
                    WHERE id = $8
                    "#,
                )
                .bind(&product_name)
                .bind(brand_id)
                .bind(category_id)
                .bind(&grade)
                .bind(data.nova_group)
                .bind(data.quality_score)
                .bind(&data.image_url)
                .bind(product_id)
                .execute(&mut **tx)
                .await?;
                product_id
            },
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO products (
                        code, product_name, brand_id, category_id,
                        nutriscore_grade, nova_group, quality_score,
                        image_url, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING id
                    "#,
                )
                .bind(&data.code)
                .bind(&product_name)
                .bind(brand_id)
                .bind(category_id)
                .bind(&grade)
                .bind(data.nova_group)
                .bind(data.quality_score)
                .bind(&data.image_url)
                .bind(now_iso8601())
                .fetch_one(&mut **tx)
                .await?
            },
        };

        if let Some(nutrition) = data.nutrition.as_ref() {
            if !nutrition.is_empty() {
                Self::upsert_nutrition(tx, product_id, nutrition).await?;
            }
        }

        Ok(true)
    }

    async fn get_or_create_brand(
        tx: &mut Transaction<'_, Sqlite>,
        caches: &mut RunCaches,
        name: &str,
    ) -> Result<Option<i64>> {
        Self::get_or_create_lookup(
            tx,
            &mut caches.brands,
            "SELECT id FROM brands WHERE name = $1",
            "INSERT INTO brands (name) VALUES ($1) RETURNING id",
            name,
        )
        .await
    }

    async fn get_or_create_category(
        tx: &mut Transaction<'_, Sqlite>,
        caches: &mut RunCaches,
        name: &str,
    ) -> Result<Option<i64>> {
        Self::get_or_create_lookup(
            tx,
            &mut caches.categories,
            "SELECT id FROM categories WHERE name = $1",
            "INSERT INTO categories (name) VALUES ($1) RETURNING id",
            name,
        )
        .await
    }

    /// Resolve a lookup entity by unique name: cache, then store, then
    /// insert. Empty names yield no entity (null foreign key).
    async fn get_or_create_lookup(
        tx: &mut Transaction<'_, Sqlite>,
        cache: &mut HashMap<String, i64>,
        select_sql: &str,
        insert_sql: &str,
        name: &str,
    ) -> Result<Option<i64>> {
        let name = truncate_chars(name.trim(), MAX_LOOKUP_NAME_LEN);
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(id) = cache.get(&name) {
            return Ok(Some(*id));
        }

        let existing: Option<i64> = sqlx::query_scalar(select_sql)
            .bind(&name)
            .fetch_optional(&mut **tx)
            .await?;

        let id = match existing {
            Some(id) => id,
            None => sqlx::query_scalar(insert_sql)
                .bind(&name)
                .fetch_one(&mut **tx)
                .await?,
        };

        cache.insert(name, id);
        Ok(Some(id))
    }

    /// Create or refresh the 1:1 nutrition row for a product
    async fn upsert_nutrition(
        tx: &mut Transaction<'_, Sqlite>,
        product_id: i64,
        nutrition: &NutritionPer100g,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nutrition_facts (
                product_id, energy_kcal, fat, saturated_fat,
                carbohydrates, sugars, fiber, proteins, salt
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (product_id)
            DO UPDATE SET
                energy_kcal = excluded.energy_kcal,
                fat = excluded.fat,
                saturated_fat = excluded.saturated_fat,
                carbohydrates = excluded.carbohydrates,
                sugars = excluded.sugars,
                fiber = excluded.fiber,
                proteins = excluded.proteins,
                salt = excluded.salt
            "#,
        )
        .bind(product_id)
        .bind(nutrition.energy_kcal)
        .bind(nutrition.fat)
        .bind(nutrition.saturated_fat)
        .bind(nutrition.carbohydrates)
        .bind(nutrition.sugars)
        .bind(nutrition.fiber)
        .bind(nutrition.proteins)
        .bind(nutrition.salt)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Truncate to a maximum number of characters without splitting a code point
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ============================================================================
// Tests
// ============================================================================
