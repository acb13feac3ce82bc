//! Delimited dataset parsing
//!
//! Parses uploaded delimited content into a header and row maps. The first
//! record is the header; every following record becomes a column-name ->
//! value map. Short rows leave trailing columns absent rather than failing
//! the whole upload; over-long rows are an error.

use crate::errors::IngestionError;
use leadforge_fulfillment::Delimiter;
use std::collections::{HashMap, HashSet};

/// A parsed dataset: ordered header plus row field maps
#[derive(Debug, Clone)]
pub struct ParsedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl ParsedDataset {
    /// Row count ("leads") of the dataset
    pub fn lead_count(&self) -> usize {
        self.rows.len()
    }
}

/// Parse delimited content into a dataset
pub fn parse_dataset(content: &str, delimiter: Delimiter) -> Result<ParsedDataset, IngestionError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => {
            return Err(IngestionError::ParseError {
                row: 0,
                message: e.to_string(),
            })
        }
        None => return Err(IngestionError::EmptyDataset("no header row".to_string())),
    };

    let columns: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
    if columns.iter().all(|c| c.is_empty()) {
        return Err(IngestionError::EmptyDataset("blank header row".to_string()));
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.as_str()) {
            return Err(IngestionError::DuplicateColumn(column.clone()));
        }
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|e| IngestionError::ParseError {
            row: index + 1,
            message: e.to_string(),
        })?;

        if record.len() > columns.len() {
            return Err(IngestionError::ParseError {
                row: index + 1,
                message: format!(
                    "Row has {} fields but the header declares {}",
                    record.len(),
                    columns.len()
                ),
            });
        }

        // Skip fully blank records
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let mut fields = HashMap::new();
        for (column, value) in columns.iter().zip(record.iter()) {
            fields.insert(column.clone(), value.trim().to_string());
        }
        rows.push(fields);
    }

    Ok(ParsedDataset { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_separated() {
        let content = "email,country\na@b.com,US\nc@d.com,CA\n";
        let dataset = parse_dataset(content, Delimiter::Comma).unwrap();

        assert_eq!(dataset.columns, vec!["email", "country"]);
        assert_eq!(dataset.lead_count(), 2);
        assert_eq!(
            dataset.rows[0].get("email").map(String::as_str),
            Some("a@b.com")
        );
        assert_eq!(
            dataset.rows[1].get("country").map(String::as_str),
            Some("CA")
        );
    }

    #[test]
    fn test_parse_pipe_separated() {
        let content = "email|phone\na@b.com|555-0100\n";
        let dataset = parse_dataset(content, Delimiter::Pipe).unwrap();

        assert_eq!(dataset.columns, vec!["email", "phone"]);
        assert_eq!(
            dataset.rows[0].get("phone").map(String::as_str),
            Some("555-0100")
        );
    }

    #[test]
    fn test_parse_tab_separated() {
        let content = "email\tcountry\na@b.com\tUS\n";
        let dataset = parse_dataset(content, Delimiter::Tab).unwrap();
        assert_eq!(dataset.lead_count(), 1);
    }

    #[test]
    fn test_short_rows_leave_fields_absent() {
        let content = "email,country,phone\na@b.com,US\n";
        let dataset = parse_dataset(content, Delimiter::Comma).unwrap();

        assert_eq!(dataset.lead_count(), 1);
        assert_eq!(dataset.rows[0].get("phone"), None);
    }

    #[test]
    fn test_over_long_row_rejected() {
        let content = "email,country\na@b.com,US,extra\n";
        let err = parse_dataset(content, Delimiter::Comma).unwrap_err();
        assert!(matches!(err, IngestionError::ParseError { row: 1, .. }));
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(matches!(
            parse_dataset("", Delimiter::Comma),
            Err(IngestionError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let content = "email,email\na@b.com,c@d.com\n";
        assert!(matches!(
            parse_dataset(content, Delimiter::Comma),
            Err(IngestionError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let content = "email,country\na@b.com,US\n,\nc@d.com,CA\n";
        let dataset = parse_dataset(content, Delimiter::Comma).unwrap();
        assert_eq!(dataset.lead_count(), 2);
    }

    #[test]
    fn test_values_are_trimmed() {
        let content = "email,country\n a@b.com , US \n";
        let dataset = parse_dataset(content, Delimiter::Comma).unwrap();
        assert_eq!(
            dataset.rows[0].get("email").map(String::as_str),
            Some("a@b.com")
        );
    }
}
