//! Schema Bootstrapper - creates `banks` and `reviews` on first use.

use tracing::{debug, info};

use crate::error::LoadError;
use crate::store::{ReviewStore, Table};

/// `banks` must be created first: the `reviews` foreign key references it.
pub const CREATE_BANKS: &str = r#"
    CREATE TABLE IF NOT EXISTS banks (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        name VARCHAR(50) UNIQUE NOT NULL
    )
"#;

pub const CREATE_REVIEWS: &str = r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        review_text TEXT NOT NULL,
        rating SMALLINT NOT NULL,
        review_date DATE NOT NULL,
        bank_id BIGINT NOT NULL,
        sentiment_label VARCHAR(20) NOT NULL,
        sentiment_score DOUBLE PRECISION NOT NULL,
        theme VARCHAR(4000),
        CONSTRAINT fk_bank
            FOREIGN KEY (bank_id)
            REFERENCES banks(id)
    )
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// Both tables were already present; nothing was executed.
    Existing,
    /// At least one table was missing and the DDL was committed.
    Created,
}

/// Idempotently ensures both tables exist.
pub async fn ensure_tables<S: ReviewStore>(store: &mut S) -> Result<Bootstrap, LoadError> {
    let banks = store.table_exists(Table::Banks).await.map_err(LoadError::Bootstrap)?;
    let reviews = store
        .table_exists(Table::Reviews)
        .await
        .map_err(LoadError::Bootstrap)?;
    debug!(banks, reviews, "checked tables");

    if banks && reviews {
        return Ok(Bootstrap::Existing);
    }

    println!("Creating required tables...");
    store.create_tables().await.map_err(LoadError::Bootstrap)?;
    store.commit().await.map_err(LoadError::Bootstrap)?;
    info!("tables created");
    println!("Tables created successfully");
    Ok(Bootstrap::Created)
}
