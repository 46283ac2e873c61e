// src/process/classify.rs

use std::fmt;

use crate::period::Period;
use crate::process::normalize::NormalizedTable;

/// The three FR Y-9 report types, distinguished by the prefix their variable
/// names carry in the source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilerType {
    Y9C,
    Y9LP,
    Y9SP,
}

impl FilerType {
    /// Enumeration order doubles as the classification tie-break priority:
    /// the first variant reaching the maximum count wins.
    pub const ALL: [FilerType; 3] = [FilerType::Y9C, FilerType::Y9LP, FilerType::Y9SP];

    pub fn prefix(self) -> &'static str {
        match self {
            FilerType::Y9C => "BHCK",
            FilerType::Y9LP => "BHCP",
            FilerType::Y9SP => "BHSP",
        }
    }

    /// Archive subdirectory holding this variant's quarterly tables.
    pub fn dir_name(self) -> &'static str {
        match self {
            FilerType::Y9C => "y_9c",
            FilerType::Y9LP => "y_9lp",
            FilerType::Y9SP => "y_9sp",
        }
    }
}

impl fmt::Display for FilerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilerType::Y9C => "FR Y-9C",
            FilerType::Y9LP => "FR Y-9LP",
            FilerType::Y9SP => "FR Y-9SP",
        };
        write!(f, "{}", name)
    }
}

/// Column indices per prefix, in source order. Computed once per file;
/// columns matching no prefix are metadata and belong to no variant.
pub fn prefix_columns(headers: &[String]) -> [Vec<usize>; 3] {
    let mut cols: [Vec<usize>; 3] = Default::default();
    for (i, header) in headers.iter().enumerate() {
        for (k, filer) in FilerType::ALL.iter().enumerate() {
            if header.starts_with(filer.prefix()) {
                cols[k].push(i);
            }
        }
    }
    cols
}

/// Decide which schedule a row belongs to: the prefix with the strictly
/// highest count of non-empty fields wins, ties go to the earlier variant in
/// `FilerType::ALL`. All-zero counts mean the row matches no schedule.
pub fn classify(row: &[String], cols: &[Vec<usize>; 3]) -> Option<FilerType> {
    classify_index(row, cols).map(|k| FilerType::ALL[k])
}

/// Same decision as `classify`, returned as an index into `FilerType::ALL`
/// so callers partitioning by variant can address their buckets directly.
fn classify_index(row: &[String], cols: &[Vec<usize>; 3]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for k in 0..FilerType::ALL.len() {
        let count = cols[k]
            .iter()
            .filter(|&&i| !row[i].trim().is_empty())
            .count();
        let wins = match best {
            Some((_, c)) => count > c,
            None => count > 0,
        };
        if wins {
            best = Some((k, count));
        }
    }
    best.map(|(k, _)| k)
}

/// One per-variant output table: identifier, period, and only the columns
/// carrying that variant's prefix. Never constructed with zero rows.
#[derive(Debug)]
pub struct VariantTable {
    pub filer_type: FilerType,
    pub period: Period,
    pub headers: Vec<String>,
    pub ids: Vec<i64>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
pub struct SplitTables {
    pub tables: Vec<VariantTable>,
    /// Rows excluded because no prefix had a populated field. Not an error,
    /// but worth surfacing when debugging a vintage.
    pub unknown_rows: usize,
}

/// Partition a normalized filing into per-variant tables. Variants with no
/// rows in this file produce no table at all.
pub fn split_by_filer(table: &NormalizedTable) -> SplitTables {
    let cols = prefix_columns(&table.headers);

    let mut ids: [Vec<i64>; 3] = Default::default();
    let mut rows: [Vec<Vec<String>>; 3] = Default::default();
    let mut unknown_rows = 0usize;

    for (id, row) in table.ids.iter().zip(&table.rows) {
        match classify_index(row, &cols) {
            Some(k) => {
                ids[k].push(*id);
                rows[k].push(cols[k].iter().map(|&i| row[i].clone()).collect());
            }
            None => unknown_rows += 1,
        }
    }

    let mut tables = Vec::new();
    for (k, filer) in FilerType::ALL.iter().enumerate() {
        if ids[k].is_empty() {
            continue;
        }
        tables.push(VariantTable {
            filer_type: *filer,
            period: table.period,
            headers: cols[k].iter().map(|&i| table.headers[i].clone()).collect(),
            ids: std::mem::take(&mut ids[k]),
            rows: std::mem::take(&mut rows[k]),
        });
    }

    SplitTables {
        tables,
        unknown_rows,
    }
}
