//! Record Source - reads the classified review export into memory.

use std::collections::HashMap;
use std::path::Path;

use tokio::fs;

use crate::error::LoadError;

/// One data row, keyed by column name. Empty cells are absent; every other
/// cell is kept exactly as written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    /// The cell value, or `None` if the cell is empty or the column does
    /// not exist.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// The parsed file: header columns in file order plus rows in file order.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Reads and parses the CSV file at `path`.
pub async fn read_path(path: &Path) -> Result<RecordSet, LoadError> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(LoadError::SourceMalformed(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    if content.trim_start_matches('\u{feff}').trim().is_empty() {
        return Err(LoadError::SourceEmpty(path.to_path_buf()));
    }

    parse_csv(&content)
}

/// Parses CSV content with a header row. Rows must have as many fields as
/// the header. Only header names are trimmed.
pub fn parse_csv(content: &str) -> Result<RecordSet, LoadError> {
    // Strip UTF-8 BOM if present
    let content = content.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::SourceMalformed(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|e| LoadError::SourceMalformed(e.to_string()))?;
        let fields = columns
            .iter()
            .zip(row.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| (column.clone(), value.to_string()))
            .collect();
        records.push(Record { fields });
    }

    Ok(RecordSet { columns, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_file_order() {
        let set = parse_csv("bank,rating\nCBE,5\nBOA,3\nDASHEN,1\n").unwrap();
        assert_eq!(set.columns, vec!["bank", "rating"]);
        assert_eq!(set.row_count(), 3);
        assert_eq!(set.records[0].get("bank"), Some("CBE"));
        assert_eq!(set.records[2].get("bank"), Some("DASHEN"));
    }

    #[test]
    fn test_empty_cells_are_absent() {
        let set = parse_csv("bank,identified_theme(s)\nCBE,\nBOA,\"\"\n").unwrap();
        assert_eq!(set.records[0].get("identified_theme(s)"), None);
        assert_eq!(set.records[1].get("identified_theme(s)"), None);
    }

    #[test]
    fn test_cells_kept_as_written() {
        let set = parse_csv("bank,review_text\nCBE,\"  indented text  \"\nBOA,   \n").unwrap();
        assert_eq!(set.records[0].get("review_text"), Some("  indented text  "));
        assert_eq!(set.records[1].get("review_text"), Some("   "));
    }

    #[test]
    fn test_header_names_trimmed() {
        let set = parse_csv(" bank , rating \nCBE,4\n").unwrap();
        assert_eq!(set.columns, vec!["bank", "rating"]);
        assert_eq!(set.records[0].get("rating"), Some("4"));
    }

    #[test]
    fn test_quoted_fields_with_commas() {
        let set = parse_csv("bank,review_text\nCBE,\"slow, but works\"\n").unwrap();
        assert_eq!(set.records[0].get("review_text"), Some("slow, but works"));
    }

    #[test]
    fn test_header_only_has_no_rows() {
        let set = parse_csv("bank,rating\n").unwrap();
        assert_eq!(set.row_count(), 0);
        assert_eq!(set.columns.len(), 2);
    }

    #[test]
    fn test_bom_stripped() {
        let set = parse_csv("\u{feff}bank,rating\nCBE,5\n").unwrap();
        assert_eq!(set.columns[0], "bank");
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let err = parse_csv("bank,rating\nCBE,5,extra\n").unwrap_err();
        assert!(matches!(err, LoadError::SourceMalformed(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzed_reviews.csv");
        let err = read_path(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::SourceNotFound(p) if p == path));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzed_reviews.csv");
        std::fs::write(&path, "\n  \n").unwrap();
        let err = read_path(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::SourceEmpty(_)));
    }

    #[tokio::test]
    async fn test_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzed_reviews.csv");
        std::fs::write(&path, "bank,rating\nCBE,5\n").unwrap();
        let set = read_path(&path).await.unwrap();
        assert_eq!(set.row_count(), 1);
    }
}
