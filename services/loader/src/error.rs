//! Error taxonomy for the load pipeline.
//!
//! Everything here is fatal. Row-level insert failures never become a
//! `LoadError`; they are collected as [`crate::batch::RowError`] values in the
//! load summary instead.

use std::path::PathBuf;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The input file does not exist.
    #[error("Could not find the input file {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The input file has no header row.
    #[error("The input file {} is empty", .0.display())]
    SourceEmpty(PathBuf),

    /// The input file could not be read or parsed as CSV.
    #[error("Malformed input file: {0}")]
    SourceMalformed(String),

    /// Required columns are absent from the header row.
    #[error("Missing required columns: {}", .0.join(", "))]
    SchemaMissingColumns(Vec<String>),

    /// A value could not be coerced to the column's type.
    #[error("Cannot coerce column '{column}' at row {row_index}: {raw_value:?}")]
    TypeCoercion {
        column: &'static str,
        row_index: usize,
        raw_value: String,
    },

    /// Labels outside the allowlist were found in the batch.
    #[error("Invalid entity names found: {}. Only {allowed} are allowed.", .names.join(", "))]
    UnrecognizedEntity { names: Vec<String>, allowed: String },

    /// The store could not be reached.
    #[error("Database connection error: {0}")]
    Connection(#[source] StoreError),

    /// Table probing or creation failed.
    #[error("Failed to bootstrap schema: {0}")]
    Bootstrap(#[source] StoreError),

    /// Looking up or creating a dimension row failed.
    #[error("Failed to resolve entity '{label}': {source}")]
    Resolve {
        label: String,
        #[source]
        source: StoreError,
    },

    /// The insert loop failed in a way that is not local to one row.
    #[error("An error occurred during data insertion at row {row_index}: {source}")]
    Insert {
        row_index: usize,
        #[source]
        source: StoreError,
    },
}

impl LoadError {
    /// Short category name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::SourceNotFound(_)
            | LoadError::SourceEmpty(_)
            | LoadError::SourceMalformed(_) => "source",
            LoadError::SchemaMissingColumns(_) | LoadError::TypeCoercion { .. } => "validation",
            LoadError::UnrecognizedEntity { .. } => "allowlist",
            LoadError::Connection(_) => "connection",
            LoadError::Bootstrap(_) => "bootstrap",
            LoadError::Resolve { .. } => "resolve",
            LoadError::Insert { .. } => "insert",
        }
    }
}
