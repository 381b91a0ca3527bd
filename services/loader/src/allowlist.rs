//! Entity Allowlist Guard.

use crate::error::LoadError;
use crate::validate::ReviewRow;

/// Labels accepted by the reference deployment.
pub const DEFAULT_BANKS: [&str; 3] = ["CBE", "BOA", "DASHEN"];

/// How a null bank cell is reported among unrecognized labels.
pub const NULL_LABEL: &str = "<null>";

/// Closed set of permitted dimension labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowlist {
    labels: Vec<String>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new(DEFAULT_BANKS)
    }
}

impl Allowlist {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !out.contains(&label) {
                out.push(label);
            }
        }
        Self { labels: out }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Rejects the whole batch if any row's label falls outside the
    /// allowlist. A null label is unrecognized too. On success returns the
    /// distinct labels in first-seen order.
    pub fn check(&self, rows: &[ReviewRow]) -> Result<Vec<String>, LoadError> {
        let labels = distinct_labels(rows);
        let mut unrecognized: Vec<String> = labels
            .iter()
            .filter(|label| !self.contains(label))
            .cloned()
            .collect();
        if rows.iter().any(|r| r.bank.is_none()) {
            unrecognized.push(NULL_LABEL.to_string());
        }
        if unrecognized.is_empty() {
            return Ok(labels);
        }
        Err(LoadError::UnrecognizedEntity {
            names: unrecognized,
            allowed: self.labels.join(", "),
        })
    }
}

/// Distinct non-null bank labels in first-seen order.
fn distinct_labels(rows: &[ReviewRow]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in rows.iter().filter_map(|r| r.bank.as_deref()) {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}
