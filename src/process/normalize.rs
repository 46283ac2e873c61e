// src/process/normalize.rs

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::period::Period;
use crate::process::read::RawTable;

/// Canonical name for the institution identifier column. Chicago Fed files
/// carry it as RSSD9001, FFIEC files already use RSSD_ID.
pub const ID_COLUMN: &str = "RSSD_ID";

const ID_ALIASES: [&str; 2] = ["RSSD9001", "RSSD_ID"];

/// A filing with canonical headers, a resolved identifier per row, and the
/// reporting period derived from the filename. The identifier column is
/// pulled out of the field matrix; `ids` is parallel to `rows`.
#[derive(Debug)]
pub struct NormalizedTable {
    pub period: Period,
    pub headers: Vec<String>,
    pub ids: Vec<i64>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped because the identifier was not integer-coercible.
    pub dropped_rows: usize,
}

/// Canonicalize headers, resolve the identifier column, and attach the
/// reporting period. Rows with a non-integer identifier are dropped, not
/// fatal; a missing identifier column or an unparseable filename is.
pub fn normalize(table: RawTable, file_name: &str) -> Result<NormalizedTable> {
    let period = Period::from_filename(file_name)?;

    let mut headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    let id_idx = headers
        .iter()
        .position(|h| ID_ALIASES.contains(&h.as_str()))
        .ok_or_else(|| anyhow!("RSSD identifier column not found in {}", file_name))?;
    headers.remove(id_idx);

    let mut ids = Vec::with_capacity(table.rows.len());
    let mut rows = Vec::with_capacity(table.rows.len());
    let mut dropped_rows = 0usize;

    for mut row in table.rows {
        let raw_id = row.remove(id_idx);
        match raw_id.trim().parse::<i64>() {
            Ok(id) => {
                ids.push(id);
                rows.push(row);
            }
            Err(_) => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        debug!(file = %file_name, dropped_rows, "dropped rows with non-integer identifiers");
    }

    Ok(NormalizedTable {
        period,
        headers,
        ids,
        rows,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn canonicalizes_headers_and_resolves_id() -> Result<()> {
        let table = raw(
            &[" rssd9001 ", "bhck2170"],
            &[&["1073757", "1000"], &["12345", "2000"]],
        );
        let n = normalize(table, "bhcf2103.csv")?;
        assert_eq!(n.headers, vec!["BHCK2170"]);
        assert_eq!(n.ids, vec![1073757, 12345]);
        assert_eq!(n.rows, vec![vec!["1000"], vec!["2000"]]);
        assert_eq!(n.period.label(), "2021Q1");
        Ok(())
    }

    #[test]
    fn accepts_already_canonical_id() -> Result<()> {
        let table = raw(&["RSSD_ID", "BHSP1234"], &[&["99", "5"]]);
        let n = normalize(table, "bhcf2112.csv")?;
        assert_eq!(n.ids, vec![99]);
        Ok(())
    }

    #[test]
    fn missing_identifier_names_the_file() {
        let table = raw(&["BHCK2170"], &[&["1000"]]);
        let err = normalize(table, "bhcf2103.csv").unwrap_err();
        assert!(err.to_string().contains("bhcf2103.csv"));
        assert!(err.to_string().contains("RSSD"));
    }

    #[test]
    fn drops_rows_with_bad_identifiers() -> Result<()> {
        let table = raw(
            &["RSSD9001", "BHCK2170"],
            &[&["abc", "1"], &["123", "2"], &["", "3"]],
        );
        let n = normalize(table, "bhcf2103.csv")?;
        assert_eq!(n.ids, vec![123]);
        assert_eq!(n.dropped_rows, 2);
        Ok(())
    }

    #[test]
    fn all_garbage_identifiers_is_not_fatal() -> Result<()> {
        let table = raw(&["RSSD9001", "BHCK2170"], &[&["x", "1"], &["y", "2"]]);
        let n = normalize(table, "bhcf2103.csv")?;
        assert!(n.ids.is_empty());
        assert!(n.rows.is_empty());
        assert_eq!(n.dropped_rows, 2);
        Ok(())
    }

    #[test]
    fn bad_filename_is_fatal() {
        let table = raw(&["RSSD9001"], &[&["1"]]);
        assert!(normalize(table, "data.csv").is_err());
    }
}
