// src/process/read.rs

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A delimited filing loaded into memory, every field kept as text so that
/// leading zeros survive. Separator rows have already been removed.
#[derive(Debug)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Decode file bytes as UTF-8, falling back to Latin-1 for older Chicago Fed
/// files. The fallback cannot fail: Latin-1 maps every byte to the code point
/// of the same value.
fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Chicago Fed files (through 2021 Q1) are comma-delimited, FFIEC files
/// (2021 Q2 onward) are caret-delimited. The first line decides.
fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.contains('^') {
        b'^'
    } else {
        b','
    }
}

/// Publisher-injected formatting artifact: a row whose first field is a run
/// of dashes sits between header and data in some vintages.
fn is_separator_row(row: &[String]) -> bool {
    row.first()
        .map_or(false, |f| !f.is_empty() && f.bytes().all(|b| b == b'-'))
}

/// Remove separator rows in place, returning how many were dropped.
/// Running this twice removes nothing the second time.
pub fn strip_separator_rows(rows: &mut Vec<Vec<String>>) -> usize {
    let before = rows.len();
    rows.retain(|r| !is_separator_row(r));
    before - rows.len()
}

/// Load a raw filing into a table of string fields, auto-detecting delimiter
/// and encoding. Rows that do not match the header's field count are skipped
/// rather than failing the whole file; a file with zero surviving data rows
/// is an error.
pub fn read_delimited(path: &Path) -> Result<RawTable> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = decode_bytes(&bytes);
    let delimiter = detect_delimiter(&text);

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header row of {}", path.display()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(|f| f.to_string()).collect()),
            Err(e) => {
                skipped += 1;
                debug!(file = %path.display(), "skipping malformed row: {}", e);
            }
        }
    }
    if skipped > 0 {
        warn!(file = %path.display(), skipped, "skipped malformed rows");
    }

    let separators = strip_separator_rows(&mut rows);
    if separators > 0 {
        debug!(file = %path.display(), separators, "removed separator rows");
    }

    if rows.is_empty() {
        bail!("no parseable data rows in {}", path.display());
    }

    Ok(RawTable { headers, rows })
}
