//! Store-facing phases, in their required order: allowlist guard, schema
//! bootstrap, dimension resolution, then fact insertion.

use tracing::info;

use crate::allowlist::Allowlist;
use crate::batch::{load_reviews, BatchPolicy, LoadSummary};
use crate::error::LoadError;
use crate::resolver::{resolve_entities, EntityIds};
use crate::schema::{ensure_tables, Bootstrap};
use crate::store::ReviewStore;
use crate::validate::ValidatedBatch;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub bootstrap: Bootstrap,
    pub entities: EntityIds,
    pub summary: LoadSummary,
}

/// Runs every store-facing phase. The allowlist check happens before the
/// store is touched.
pub async fn run<S: ReviewStore>(
    store: &mut S,
    batch: &ValidatedBatch,
    allowlist: &Allowlist,
    policy: BatchPolicy,
) -> Result<LoadReport, LoadError> {
    let labels = allowlist.check(&batch.rows)?;
    info!(labels = labels.len(), "allowlist check passed");

    let bootstrap = ensure_tables(store).await?;

    let entities = resolve_entities(store, &labels).await?;
    info!(
        resolved = entities.resolved_count(),
        created = entities.created().len(),
        "entities resolved"
    );

    println!("Starting data insertion...");
    let summary = load_reviews(store, &batch.rows, &entities, policy).await?;

    Ok(LoadReport {
        bootstrap,
        entities,
        summary,
    })
}
