use crate::structs::{CsvData, Result, VipError};
use csv::ReaderBuilder;
use std::path::Path;

impl CsvData {
    /// Parse a CSV or TSV file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, a record is malformed, or the
    /// header row contains a duplicated column name
    pub fn from_file(path: &Path, is_tsv: bool) -> Result<Self> {
        let delimiter = if is_tsv { b'\t' } else { b',' };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        for (i, name) in headers.iter().enumerate() {
            if headers[..i].contains(name) {
                return Err(VipError::Schema(format!(
                    "duplicate column '{name}' in {}",
                    path.display()
                )));
            }
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            // Blank trailing lines in spreadsheet exports
            if record.iter().all(|s| s.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }
}
