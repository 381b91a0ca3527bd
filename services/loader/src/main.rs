//! Loader Service - Loads classified bank reviews into the relational store
//!
//! Responsibilities:
//! - Read the analyzed reviews CSV
//! - Validate required columns and coerce numeric/date fields
//! - Reject batches containing banks outside the allowlist
//! - Bootstrap the banks/reviews schema on first use
//! - Get-or-create one banks row per distinct label
//! - Insert reviews with per-row failure isolation and checkpoint commits
//!
//! Usage:
//!   cargo run --bin loader -- --input data/analyzed_reviews.csv
//!
//!   # Validate and load into an in-memory store only:
//!   cargo run --bin loader -- --dry-run

mod allowlist;
mod batch;
mod config;
mod error;
mod logging;
mod pipeline;
mod resolver;
mod schema;
mod source;
mod store;
mod validate;

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};

use crate::config::{Args, Config, StoreTarget};
use crate::error::LoadError;
use crate::pipeline::LoadReport;
use crate::schema::Bootstrap;
use crate::store::{MemoryStore, PgStore, ReviewStore};
use crate::validate::{NullCount, ValidatedBatch};

/// Logs a fatal error before it propagates out of `main`.
fn fatal(e: LoadError) -> anyhow::Error {
    error!(kind = e.kind(), error = %e, "load failed");
    e.into()
}

/// Runs the store phases and releases the session on every exit path.
async fn run_and_close<S: ReviewStore>(
    mut store: S,
    batch: &ValidatedBatch,
    config: &Config,
) -> Result<LoadReport, LoadError> {
    let result = pipeline::run(&mut store, batch, &config.allowlist, config.policy).await;
    if let Err(e) = store.close().await {
        warn!(error = %e, "failed to close store session");
    }
    println!("Database connection closed.");
    result
}

fn print_null_warning(null_counts: &[NullCount]) {
    if null_counts.is_empty() {
        return;
    }
    println!("Warning: Found null values in the following columns:");
    for count in null_counts {
        println!("  {:<22} {}", count.column, count.nulls);
    }
}

fn print_summary(report: &LoadReport) {
    let summary = &report.summary;
    println!("\n=== Insertion Completed ===");
    if report.bootstrap == Bootstrap::Created {
        println!("Schema: created banks/reviews tables");
    }
    println!(
        "Banks: {} resolved, {} created",
        report.entities.resolved_count(),
        report.entities.created().len()
    );
    println!(
        "Processed {} rows with {} checkpoint commits",
        summary.total_rows, summary.checkpoints
    );
    println!("Successfully inserted: {} records", summary.inserted);
    if summary.failed > 0 {
        println!("Failed to insert: {} records", summary.failed);
        println!("First few errors:");
        for error in &summary.errors {
            println!("  {}", error);
        }
    }
}

/// Shows a sample of what a dry run staged in memory.
fn print_staged(store: &MemoryStore) {
    let banks = store.committed_banks();
    let reviews = store.committed_reviews();
    println!(
        "\nDry run - {} banks and {} reviews staged in memory, nothing saved to database",
        banks.len(),
        reviews.len()
    );
    for (i, review) in reviews.iter().take(3).enumerate() {
        let bank = banks
            .iter()
            .find(|(id, _)| *id == review.bank_id)
            .map_or("?", |(_, name)| name.as_str());
        let text: String = review.review_text.chars().take(40).collect();
        println!(
            "  [{}] #{} {} | {} | {} | {} {:.2} | {} | {}",
            i + 1,
            review.id,
            bank,
            review.review_date,
            review.rating,
            review.sentiment_label,
            review.sentiment_score,
            review.theme.as_deref().unwrap_or("-"),
            text
        );
    }
    if reviews.len() > 3 {
        println!("  ... and {} more", reviews.len() - 3);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init();
    let config = Config::from_args(args)?;

    println!("=== Bank Reviews Loader ===");
    println!("Input: {}", config.input.display());
    println!(
        "Mode: {}",
        if config.target == StoreTarget::Memory { "dry-run" } else { "live" }
    );

    println!("Loading data from CSV...");
    let records = source::read_path(&config.input).await.map_err(fatal)?;
    println!("Successfully loaded {} records", records.row_count());

    let null_counts = validate::check_columns(&records).map_err(fatal)?;
    print_null_warning(&null_counts);
    let batch = validate::coerce(&records).map_err(fatal)?;
    println!("Data validation completed successfully");

    let dry_run = MemoryStore::new();

    let report = match &config.target {
        StoreTarget::Postgres { db_url } => {
            println!("Connecting to database...");
            let store = PgStore::connect(db_url)
                .await
                .map_err(LoadError::Connection)
                .map_err(fatal)?;
            println!("Database connection established successfully");
            run_and_close(store, &batch, &config).await
        }
        StoreTarget::Memory => run_and_close(dry_run.session(), &batch, &config).await,
    }
    .map_err(fatal)?;

    print_summary(&report);
    if config.target == StoreTarget::Memory {
        print_staged(&dry_run);
    }
    Ok(())
}
