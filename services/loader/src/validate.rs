//! Schema Validator - required columns, null report and type coercion.
//!
//! Structural defects fail the whole run here. Nulls only produce a warning;
//! a null bank is rejected by the allowlist, and a row carrying any other
//! null in a required field fails later, at insert time.

use chrono::NaiveDate;

use crate::error::LoadError;
use crate::source::{Record, RecordSet};

pub const BANK: &str = "bank";
pub const REVIEW_TEXT: &str = "review_text";
pub const RATING: &str = "rating";
pub const DATE: &str = "date";
pub const SENTIMENT_LABEL: &str = "sentiment_label";
pub const SENTIMENT_SCORE: &str = "sentiment_score";
pub const THEME: &str = "identified_theme(s)";

pub const REQUIRED_COLUMNS: [&str; 7] = [
    BANK,
    REVIEW_TEXT,
    RATING,
    DATE,
    SENTIMENT_LABEL,
    SENTIMENT_SCORE,
    THEME,
];

/// Stored date format of the input `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A row after type coercion. `None` marks a null cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    /// Zero-based position among data rows.
    pub row_index: usize,
    pub bank: Option<String>,
    pub review_text: Option<String>,
    pub rating: Option<f64>,
    pub date: Option<NaiveDate>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub theme: Option<String>,
}

/// Null count for one required column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullCount {
    pub column: &'static str,
    pub nulls: usize,
}

#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub rows: Vec<ReviewRow>,
}

/// Checks that every required column is present, then counts nulls per
/// required column. Only columns with at least one null are returned, in
/// required-column order.
pub fn check_columns(set: &RecordSet) -> Result<Vec<NullCount>, LoadError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !set.columns.iter().any(|c| c == *required))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::SchemaMissingColumns(missing));
    }
    Ok(count_nulls(&set.records))
}

/// Coerces every row, failing on the first value that cannot be coerced.
/// Expects [`check_columns`] to have passed.
pub fn coerce(set: &RecordSet) -> Result<ValidatedBatch, LoadError> {
    let rows = set
        .records
        .iter()
        .enumerate()
        .map(|(row_index, record)| coerce_row(row_index, record))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ValidatedBatch { rows })
}

/// Both validation steps, for callers that do not report nulls.
#[cfg(test)]
pub fn validate(set: &RecordSet) -> Result<ValidatedBatch, LoadError> {
    check_columns(set)?;
    coerce(set)
}

fn count_nulls(records: &[Record]) -> Vec<NullCount> {
    REQUIRED_COLUMNS
        .iter()
        .map(|&column| NullCount {
            column,
            nulls: records.iter().filter(|r| r.get(column).is_none()).count(),
        })
        .filter(|c| c.nulls > 0)
        .collect()
}

fn coerce_row(row_index: usize, record: &Record) -> Result<ReviewRow, LoadError> {
    Ok(ReviewRow {
        row_index,
        bank: record.get(BANK).map(|v| v.trim().to_string()),
        review_text: record.get(REVIEW_TEXT).map(str::to_string),
        rating: coerce_number(record, RATING, row_index)?,
        date: coerce_date(record, row_index)?,
        sentiment_label: record.get(SENTIMENT_LABEL).map(|v| v.trim().to_string()),
        sentiment_score: coerce_number(record, SENTIMENT_SCORE, row_index)?,
        theme: record.get(THEME).map(str::to_string),
    })
}

fn coerce_number(
    record: &Record,
    column: &'static str,
    row_index: usize,
) -> Result<Option<f64>, LoadError> {
    let Some(raw) = record.get(column) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(LoadError::TypeCoercion {
            column,
            row_index,
            raw_value: raw.to_string(),
        }),
    }
}

fn coerce_date(record: &Record, row_index: usize) -> Result<Option<NaiveDate>, LoadError> {
    let Some(raw) = record.get(DATE) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(Some)
        .map_err(|_| LoadError::TypeCoercion {
            column: DATE,
            row_index,
            raw_value: raw.to_string(),
        })
}
