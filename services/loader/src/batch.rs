//! Batch Loader - inserts reviews with per-row failure isolation and
//! periodic checkpoint commits.

use std::fmt;

use tracing::{debug, error, warn};

use crate::error::LoadError;
use crate::resolver::EntityIds;
use crate::store::{NewReview, ReviewStore};
use crate::validate::ReviewRow;

pub const DEFAULT_CHECKPOINT_EVERY: usize = 100;
pub const DEFAULT_ERROR_SAMPLE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Commit after this many successful inserts. Must be at least 1.
    pub checkpoint_every: usize,
    /// How many row errors to keep for the report.
    pub error_sample: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            error_sample: DEFAULT_ERROR_SAMPLE,
        }
    }
}

/// A row that was not inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_index: usize,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at row {}: {}", self.row_index, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub total_rows: usize,
    pub inserted: usize,
    pub failed: usize,
    /// The first `error_sample` row errors, in row order.
    pub errors: Vec<RowError>,
    /// Checkpoint commits issued inside the loop, excluding the final one.
    pub checkpoints: usize,
}

impl LoadSummary {
    fn record_error(&mut self, policy: &BatchPolicy, row_index: usize, message: String) {
        warn!(row_index, %message, "row not inserted");
        self.failed += 1;
        if self.errors.len() < policy.error_sample {
            self.errors.push(RowError { row_index, message });
        }
    }
}

/// Builds the insert for one row, or explains why the row cannot be built.
fn build_review<'a>(row: &'a ReviewRow, ids: &EntityIds) -> Result<NewReview<'a>, String> {
    let bank = row.bank.as_deref().ok_or("bank is null")?;
    let bank_id = ids
        .get(bank)
        .ok_or_else(|| format!("bank '{bank}' has no resolved id"))?;

    let rating = row.rating.ok_or("rating is null")?;
    if rating.fract() != 0.0 || rating < i16::MIN as f64 || rating > i16::MAX as f64 {
        return Err(format!("rating {rating} is not a small integer"));
    }

    Ok(NewReview {
        review_text: row.review_text.as_deref(),
        rating: rating as i16,
        review_date: row.date,
        bank_id,
        sentiment_label: row.sentiment_label.as_deref(),
        sentiment_score: row.sentiment_score,
        theme: row.theme.as_deref(),
    })
}

/// Inserts every row in source order.
///
/// Row-local failures are counted and the loop moves on. A failure that is
/// not local to the row (lost connection, failed checkpoint) rolls back the
/// work since the last checkpoint and is returned as fatal.
pub async fn load_reviews<S: ReviewStore>(
    store: &mut S,
    rows: &[ReviewRow],
    ids: &EntityIds,
    policy: BatchPolicy,
) -> Result<LoadSummary, LoadError> {
    let checkpoint_every = policy.checkpoint_every.max(1);
    let mut summary = LoadSummary {
        total_rows: rows.len(),
        ..LoadSummary::default()
    };

    for row in rows {
        let review = match build_review(row, ids) {
            Ok(review) => review,
            Err(message) => {
                summary.record_error(&policy, row.row_index, message);
                continue;
            }
        };

        match store.insert_review(&review).await {
            Ok(()) => {
                summary.inserted += 1;
            }
            Err(e) if e.is_row_local() => {
                summary.record_error(&policy, row.row_index, e.to_string());
                continue;
            }
            Err(e) => return Err(abort(store, row.row_index, e).await),
        }

        if summary.inserted % checkpoint_every == 0 {
            if let Err(e) = store.commit().await {
                return Err(abort(store, row.row_index, e).await);
            }
            summary.checkpoints += 1;
            debug!(inserted = summary.inserted, "checkpoint committed");
            println!("Inserted {} records...", summary.inserted);
        }
    }

    let last_row = rows.last().map_or(0, |r| r.row_index);
    if let Err(e) = store.commit().await {
        return Err(abort(store, last_row, e).await);
    }

    Ok(summary)
}

async fn abort<S: ReviewStore>(
    store: &mut S,
    row_index: usize,
    source: crate::store::StoreError,
) -> LoadError {
    error!(row_index, error = %source, "insertion aborted, rolling back to last checkpoint");
    if let Err(e) = store.rollback().await {
        error!(error = %e, "rollback failed");
    }
    LoadError::Insert { row_index, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_entities;
    use crate::schema::ensure_tables;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn row(row_index: usize, bank: &str, rating: f64) -> ReviewRow {
        ReviewRow {
            row_index,
            bank: Some(bank.to_string()),
            review_text: Some(format!("review {row_index}")),
            rating: Some(rating),
            date: NaiveDate::from_ymd_opt(2024, 6, 1),
            sentiment_label: Some("POSITIVE".to_string()),
            sentiment_score: Some(0.9),
            theme: Some("UX".to_string()),
        }
    }

    fn rows(n: usize) -> Vec<ReviewRow> {
        (0..n).map(|i| row(i, "CBE", 5.0)).collect()
    }

    async fn prepared(labels: &[&str]) -> (MemoryStore, EntityIds) {
        let store = MemoryStore::new();
        let mut session = store.session();
        ensure_tables(&mut session).await.unwrap();
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let ids = resolve_entities(&mut session, &labels).await.unwrap();
        (store, ids)
    }

    // -------------------------------------------------------------------------
    // COUNTS AND ORDER
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_all_rows_inserted_in_source_order() {
        let (store, ids) = prepared(&["CBE", "BOA"]).await;
        let input = vec![row(0, "CBE", 5.0), row(1, "BOA", 1.0), row(2, "CBE", 3.0)];

        let summary = load_reviews(&mut store.session(), &input, &ids, BatchPolicy::default())
            .await
            .unwrap();

        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.failed, 0);
        assert!(summary.errors.is_empty());

        let stored = store.committed_reviews();
        let texts: Vec<&str> = stored.iter().map(|r| r.review_text.as_str()).collect();
        assert_eq!(texts, vec!["review 0", "review 1", "review 2"]);
        assert_eq!(stored[1].bank_id, ids.get("BOA").unwrap());
        assert_eq!(stored[1].rating, 1);
    }

    #[tokio::test]
    async fn test_empty_input_commits_nothing_and_succeeds() {
        let (store, ids) = prepared(&[]).await;
        let summary = load_reviews(&mut store.session(), &[], &ids, BatchPolicy::default())
            .await
            .unwrap();
        assert_eq!(summary, LoadSummary::default());
    }

    // -------------------------------------------------------------------------
    // ROW ISOLATION
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_bad_row_does_not_block_later_rows() {
        let (store, ids) = prepared(&["CBE"]).await;
        let mut input = rows(4);
        input[1].sentiment_label = Some("A LABEL THAT IS WAY TOO LONG".to_string());

        let summary = load_reviews(&mut store.session(), &input, &ids, BatchPolicy::default())
            .await
            .unwrap();

        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inserted + summary.failed, summary.total_rows);
        assert_eq!(summary.errors[0].row_index, 1);
        assert!(summary.errors[0].to_string().starts_with("Error at row 1: "));
        assert_eq!(store.committed_reviews().len(), 3);
    }

    #[tokio::test]
    async fn test_null_fields_fail_only_their_row() {
        let (store, ids) = prepared(&["CBE"]).await;
        let mut input = rows(5);
        input[0].bank = None;
        input[1].rating = None;
        input[2].date = None;
        input[3].review_text = None;

        let summary = load_reviews(&mut store.session(), &input, &ids, BatchPolicy::default())
            .await
            .unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.failed, 4);
        let failed_rows: Vec<usize> = summary.errors.iter().map(|e| e.row_index).collect();
        assert_eq!(failed_rows, vec![0, 1, 2, 3]);
        assert!(summary.errors[0].message.contains("bank is null"));
        assert!(summary.errors[2].message.contains("review_date"));
    }

    #[tokio::test]
    async fn test_non_integral_rating_is_row_error() {
        let (store, ids) = prepared(&["CBE"]).await;
        let input = vec![row(0, "CBE", 4.5), row(1, "CBE", 70000.0), row(2, "CBE", 2.0)];
        let summary = load_reviews(&mut store.session(), &input, &ids, BatchPolicy::default())
            .await
            .unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.failed, 2);
        assert!(summary.errors[0].message.contains("4.5"));
    }

    #[tokio::test]
    async fn test_error_sample_is_bounded() {
        let (store, ids) = prepared(&["CBE"]).await;
        let mut input = rows(12);
        for r in input.iter_mut().take(8) {
            r.review_text = None;
        }
        let summary = load_reviews(&mut store.session(), &input, &ids, BatchPolicy::default())
            .await
            .unwrap();
        assert_eq!(summary.failed, 8);
        assert_eq!(summary.errors.len(), DEFAULT_ERROR_SAMPLE);
        assert!(summary.errors.len() <= summary.failed);
        assert_eq!(summary.errors[4].row_index, 4);
    }

    // -------------------------------------------------------------------------
    // CHECKPOINTS
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_checkpoint_every_n_successful_inserts() {
        let (store, ids) = prepared(&["CBE"]).await;
        let policy = BatchPolicy {
            checkpoint_every: 100,
            error_sample: 5,
        };
        let summary = load_reviews(&mut store.session(), &rows(250), &ids, policy)
            .await
            .unwrap();
        assert_eq!(summary.checkpoints, 2);
        assert_eq!(store.committed_reviews().len(), 250);
    }

    #[tokio::test]
    async fn test_failed_rows_do_not_count_toward_checkpoint() {
        let (store, ids) = prepared(&["CBE"]).await;
        let mut input = rows(4);
        input[0].review_text = None;
        let policy = BatchPolicy {
            checkpoint_every: 2,
            error_sample: 5,
        };
        let summary = load_reviews(&mut store.session(), &input, &ids, policy)
            .await
            .unwrap();
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.checkpoints, 1);
    }

    #[tokio::test]
    async fn test_connection_loss_keeps_checkpointed_rows() {
        let (store, ids) = prepared(&["CBE"]).await;
        let mut session = store.session();
        session.disconnect_after_inserts(7);
        let policy = BatchPolicy {
            checkpoint_every: 3,
            error_sample: 5,
        };

        let err = load_reviews(&mut session, &rows(10), &ids, policy)
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Insert { row_index: 7, .. }));
        // Rows 0..6 were checkpointed, row 6 was pending and rolled back
        assert_eq!(store.committed_reviews().len(), 6);
    }
}
