//! Store session used by every phase of the pipeline.
//!
//! A session owns at most one open transaction. Statements run inside it
//! until `commit` or `rollback` closes it; the next statement opens a new one.

use chrono::NaiveDate;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The two tables of the persisted schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Banks,
    Reviews,
}

/// A fact row ready for insertion.
///
/// Nullable input fields stay `Option` so the store enforces `NOT NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview<'a> {
    pub review_text: Option<&'a str>,
    pub rating: i16,
    pub review_date: Option<NaiveDate>,
    pub bank_id: i64,
    pub sentiment_label: Option<&'a str>,
    pub sentiment_score: Option<f64>,
    pub theme: Option<&'a str>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// A statement rejected by the store's constraints.
    #[error("{0}")]
    Constraint(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

impl StoreError {
    /// Whether the failure concerns only the statement's own data, leaving
    /// the session usable for the next statement.
    pub fn is_row_local(&self) -> bool {
        match self {
            StoreError::Sql(sqlx::Error::Database(_)) | StoreError::Sql(sqlx::Error::Encode(_)) => {
                true
            }
            StoreError::Constraint(_) => true,
            _ => false,
        }
    }
}

/// Primitives the pipeline consumes from the relational store.
#[allow(async_fn_in_trait)]
pub trait ReviewStore {
    /// Cheap existence check. `Ok(false)` means the table is absent.
    async fn table_exists(&mut self, table: Table) -> Result<bool, StoreError>;

    /// Creates `banks` then `reviews`, skipping whichever already exists.
    async fn create_tables(&mut self) -> Result<(), StoreError>;

    async fn find_entity(&mut self, name: &str) -> Result<Option<i64>, StoreError>;

    /// Inserts a dimension row and returns its generated id.
    async fn create_entity(&mut self, name: &str) -> Result<i64, StoreError>;

    /// Inserts one fact row. A row-local failure must leave the session's
    /// open transaction usable.
    async fn insert_review(&mut self, review: &NewReview<'_>) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;

    /// Releases the session, discarding uncommitted work.
    async fn close(self) -> Result<(), StoreError>;
}
