//! Postgres session over sqlx.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection as _, PgPool, Postgres, Transaction};
use tracing::instrument;

use super::{NewReview, ReviewStore, StoreError, Table};
use crate::schema::{CREATE_BANKS, CREATE_REVIEWS};

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// A single-connection session with one explicit transaction at a time.
#[derive(Debug)]
pub struct PgStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStore {
    #[instrument(skip_all, err)]
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self { pool, tx: None })
    }

    /// Returns the open transaction, beginning one if needed.
    async fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(self.tx.insert(tx))
    }
}

fn existence_query(table: Table) -> &'static str {
    match table {
        Table::Banks => "SELECT 1 FROM banks LIMIT 1",
        Table::Reviews => "SELECT 1 FROM reviews LIMIT 1",
    }
}

impl ReviewStore for PgStore {
    async fn table_exists(&mut self, table: Table) -> Result<bool, StoreError> {
        let tx = self.tx().await?;
        // A failed statement aborts the whole transaction in Postgres, so the
        // lookup runs inside a savepoint.
        let mut sp = tx.begin().await?;
        let lookup = sqlx::query(existence_query(table)).fetch_optional(&mut *sp).await;
        match lookup {
            Ok(_) => {
                sp.commit().await?;
                Ok(true)
            }
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
                sp.rollback().await?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_tables(&mut self) -> Result<(), StoreError> {
        let tx = self.tx().await?;
        sqlx::query(CREATE_BANKS).execute(&mut **tx).await?;
        sqlx::query(CREATE_REVIEWS).execute(&mut **tx).await?;
        Ok(())
    }

    async fn find_entity(&mut self, name: &str) -> Result<Option<i64>, StoreError> {
        let tx = self.tx().await?;
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM banks WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn create_entity(&mut self, name: &str) -> Result<i64, StoreError> {
        let tx = self.tx().await?;
        let (id,): (i64,) = sqlx::query_as("INSERT INTO banks (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;
        Ok(id)
    }

    async fn insert_review(&mut self, review: &NewReview<'_>) -> Result<(), StoreError> {
        let tx = self.tx().await?;
        let mut sp = tx.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO reviews (
                review_text, rating, review_date, bank_id,
                sentiment_label, sentiment_score, theme
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.review_text)
        .bind(review.rating)
        .bind(review.review_date)
        .bind(review.bank_id)
        .bind(review.sentiment_label)
        .bind(review.sentiment_score)
        .bind(review.theme)
        .execute(&mut *sp)
        .await;

        match result {
            Ok(_) => {
                sp.commit().await?;
                Ok(())
            }
            Err(e) => {
                sp.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn close(mut self) -> Result<(), StoreError> {
        let rolled_back = self.rollback().await;
        self.pool.close().await;
        rolled_back
    }
}
