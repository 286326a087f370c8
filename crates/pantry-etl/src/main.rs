//! Pantry ETL - enrichment and load pipeline driver

use anyhow::Result;
use clap::{Parser, Subcommand};
use pantry_common::logging::{init_logging, LogConfig, LogLevel};
use pantry_etl::{DocumentStore, Enricher, EnrichmentPipeline, EtlConfig, LoadEngine};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pantry-etl")]
#[command(author, version, about = "Food catalog enrichment and load pipeline")]
struct Cli {
    /// Pipeline stage to run
    #[command(subcommand)]
    stage: Stage,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Stage {
    /// Enrich collected raw documents into scored records
    Enrich,

    /// Load successfully enriched records into the relational store
    Load,

    /// Run both stages: enrich, then load
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_file_prefix("pantry-etl");
    init_logging(&log_config)?;

    let config = EtlConfig::from_env()?;
    config.ensure_data_dir()?;

    match cli.stage {
        Stage::Enrich => {
            enrich(&config).await?;
        },
        Stage::Load => {
            load(&config).await?;
        },
        Stage::Run => {
            enrich(&config).await?;
            load(&config).await?;
        },
    }

    info!("Pipeline complete");
    Ok(())
}

async fn enrich(config: &EtlConfig) -> Result<()> {
    let documents = DocumentStore::connect(&config.document_database_url).await?;
    let enricher = Enricher::with_max_retries(config.max_retries);
    let stats = EnrichmentPipeline::with_enricher(documents, enricher)
        .run()
        .await?;
    info!(
        "Enriched {} documents ({} succeeded, {} failed)",
        stats.processed, stats.succeeded, stats.failed
    );
    Ok(())
}

async fn load(config: &EtlConfig) -> Result<()> {
    let documents = DocumentStore::connect(&config.document_database_url).await?;
    let analytics = analytics_pool(&config.analytics_database_url).await?;
    let stats = LoadEngine::with_batch_limit(documents, analytics, config.batch_limit)
        .run()
        .await?;
    info!(
        "Loaded {} products ({} skipped without a business key)",
        stats.loaded, stats.skipped
    );
    Ok(())
}

async fn analytics_pool(url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .connect(url)
        .await?;
    Ok(pool)
}
