//! Tabular datasets parsed from CSV.
//!
//! A [`Dataset`] keeps every cell as a string; numeric interpretation happens
//! on demand ([`Dataset::numeric_column`]) and in [`profile`]. Rows are
//! normalised to the header width so column indexing never goes out of bounds.

pub mod profile;

use thiserror::Error;

pub use profile::{ColumnKind, ColumnProfile, ColumnStats, DatasetSummary};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("csv parse failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no header row")]
    NoHeader,
    #[error("dataset has no data rows")]
    Empty,
    #[error("dataset exceeds the {0} row limit")]
    TooManyRows(usize),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("column '{0}' is not numeric")]
    NotNumeric(String),
}

/// Parsed CSV table.
#[derive(Debug, Clone)]
pub struct Dataset {
    id: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Parse CSV bytes. The first record is the header; blank header cells are
    /// named `column_<n>` and duplicate names get a numeric suffix.
    pub fn from_csv_bytes(id: impl Into<String>, bytes: &[u8], max_rows: usize) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let raw_headers = reader.headers()?.clone();
        if raw_headers.is_empty() || raw_headers.iter().all(str::is_empty) {
            return Err(DatasetError::NoHeader);
        }
        let headers = normalise_headers(raw_headers.iter());
        let width = headers.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            if rows.len() == max_rows {
                return Err(DatasetError::TooManyRows(max_rows));
            }
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self { id: id.into(), headers, rows })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, DatasetError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_string()))
    }

    /// Raw cells of column `idx`, in row order.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r[idx].as_str())
    }

    /// Column values as numbers; missing cells are `None`.
    ///
    /// Fails with [`DatasetError::NotNumeric`] if any present cell does not
    /// parse, or if the column has no values at all.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>, DatasetError> {
        let idx = self.column_index(name)?;
        let mut out = Vec::with_capacity(self.rows.len());
        let mut seen = false;
        for cell in self.column(idx) {
            if is_missing(cell) {
                out.push(None);
                continue;
            }
            let value = parse_number(cell).ok_or_else(|| DatasetError::NotNumeric(self.headers[idx].clone()))?;
            seen = true;
            out.push(Some(value));
        }
        if !seen {
            return Err(DatasetError::NotNumeric(self.headers[idx].clone()));
        }
        Ok(out)
    }

    /// First `n` rows (plus header) re-encoded as CSV, for prompts.
    pub fn sample_csv(&self, n: usize) -> Result<String, DatasetError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in self.rows.iter().take(n) {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| DatasetError::Csv(csv::Error::from(e.into_error())))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn summary(&self) -> DatasetSummary {
        profile::summarise(self)
    }
}

/// Markers treated as "no value" in addition to the empty cell.
const MISSING_MARKERS: &[&str] = &["na", "n/a", "nan", "null", "none", "-"];

pub fn is_missing(cell: &str) -> bool {
    let t = cell.trim();
    t.is_empty() || MISSING_MARKERS.iter().any(|m| t.eq_ignore_ascii_case(m))
}

/// Parse a numeric cell, accepting thousands separators and a trailing `%`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let t = cell.trim();
    let t = t.strip_suffix('%').unwrap_or(t);
    let cleaned: String = t.chars().filter(|c| *c != ',' && *c != '_').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalise_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (i, h) in raw.enumerate() {
        let base = if h.is_empty() { format!("column_{}", i + 1) } else { h.to_string() };
        let mut name = base.clone();
        let mut n = 2;
        while headers.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        headers.push(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES: &str = "region,units,price\nnorth,10,2.5\nsouth,4,3\nnorth,,2\neast,7,n/a\n";

    #[test]
    fn parses_headers_and_rows() {
        let ds = Dataset::from_csv_bytes("abc", SALES.as_bytes(), 100).unwrap();
        assert_eq!(ds.id(), "abc");
        assert_eq!(ds.headers(), &["region", "units", "price"]);
        assert_eq!(ds.row_count(), 4);
    }

    #[test]
    fn short_and_long_rows_normalised() {
        let csv = "a,b\n1\n2,3,4\n";
        let ds = Dataset::from_csv_bytes("x", csv.as_bytes(), 100).unwrap();
        assert_eq!(ds.rows[0], vec!["1".to_string(), String::new()]);
        assert_eq!(ds.rows[1], vec!["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn blank_and_duplicate_headers_renamed() {
        let csv = "a,,a\n1,2,3\n";
        let ds = Dataset::from_csv_bytes("x", csv.as_bytes(), 100).unwrap();
        assert_eq!(ds.headers(), &["a", "column_2", "a_2"]);
    }

    #[test]
    fn header_only_is_empty() {
        let err = Dataset::from_csv_bytes("x", b"a,b\n", 100).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn row_limit_enforced() {
        let err = Dataset::from_csv_bytes("x", SALES.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, DatasetError::TooManyRows(2)));
    }

    #[test]
    fn numeric_column_skips_missing() {
        let ds = Dataset::from_csv_bytes("x", SALES.as_bytes(), 100).unwrap();
        let units = ds.numeric_column("units").unwrap();
        assert_eq!(units, vec![Some(10.0), Some(4.0), None, Some(7.0)]);
        let price = ds.numeric_column("PRICE").unwrap();
        assert_eq!(price[3], None);
    }

    #[test]
    fn text_column_is_not_numeric() {
        let ds = Dataset::from_csv_bytes("x", SALES.as_bytes(), 100).unwrap();
        assert!(matches!(ds.numeric_column("region"), Err(DatasetError::NotNumeric(_))));
        assert!(matches!(ds.numeric_column("missing"), Err(DatasetError::UnknownColumn(_))));
    }

    #[test]
    fn parse_number_handles_separators() {
        assert_eq!(parse_number("1,234.5"), Some(1234.5));
        assert_eq!(parse_number("12%"), Some(12.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn sample_csv_limits_rows() {
        let ds = Dataset::from_csv_bytes("x", SALES.as_bytes(), 100).unwrap();
        let sample = ds.sample_csv(2).unwrap();
        let lines: Vec<&str> = sample.lines().collect();
        assert_eq!(lines, vec!["region,units,price", "north,10,2.5", "south,4,3"]);
    }
}
