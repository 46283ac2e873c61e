// src/process/mod.rs

pub mod classify;
pub mod normalize;
pub mod read;
pub mod write;

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use tracing::{instrument, warn};

use crate::dictionary::DataDictionary;
use crate::period::Period;
use classify::FilerType;

/// Row/variable counts for one persisted (file, variant) table.
#[derive(Debug, Clone)]
pub struct VariantSummary {
    pub filer_type: FilerType,
    pub rows: usize,
    pub vars: usize,
}

impl fmt::Display for VariantSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} filers, {} vars",
            self.filer_type, self.rows, self.vars
        )
    }
}

/// Outcome of processing one filing end to end.
#[derive(Debug)]
pub struct FileResult {
    pub period: Period,
    pub variants: Vec<VariantSummary>,
    /// Rows that matched no schedule prefix and appear in no output table.
    pub unknown_rows: usize,
    /// Rows dropped for a non-integer identifier.
    pub dropped_rows: usize,
}

/// Run one filing through read -> normalize -> classify -> annotate ->
/// persist. A file with zero classifiable rows still succeeds; it just
/// writes no tables.
#[instrument(level = "info", skip(csv_path, out_dir, dict), fields(file = %csv_path.display()))]
pub fn process_file(csv_path: &Path, out_dir: &Path, dict: &DataDictionary) -> Result<FileResult> {
    let file_name = csv_path
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("non-UTF-8 filename: {}", csv_path.display()))?;

    let raw = read::read_delimited(csv_path)?;
    let normalized = normalize::normalize(raw, file_name)?;
    if normalized.dropped_rows > 0 {
        warn!(
            file = %file_name,
            dropped = normalized.dropped_rows,
            "dropped rows with unresolvable identifiers"
        );
    }

    let period = normalized.period;
    let split = classify::split_by_filer(&normalized);
    if split.unknown_rows > 0 {
        warn!(
            file = %file_name,
            unknown = split.unknown_rows,
            "rows matched no schedule prefix"
        );
    }

    write::write_variants(&split.tables, out_dir, dict)?;
    let variants = split
        .tables
        .iter()
        .map(|table| VariantSummary {
            filer_type: table.filer_type,
            rows: table.ids.len(),
            vars: table.headers.len(),
        })
        .collect();

    Ok(FileResult {
        period,
        variants,
        unknown_rows: split.unknown_rows,
        dropped_rows: normalized.dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn comma_file_with_bhck_only_produces_one_y9c_table() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bhcf2103.csv");
        fs::write(
            &input,
            "RSSD9001,BHCK2170,BHCP1234,BHSP5678\n1073757,1000,,\n",
        )?;
        let out = dir.path().join("out");

        let result = process_file(&input, &out, &DataDictionary::empty())?;
        assert_eq!(result.period.label(), "2021Q1");
        assert_eq!(result.variants.len(), 1);
        assert_eq!(result.variants[0].filer_type, FilerType::Y9C);
        assert_eq!(result.variants[0].rows, 1);

        assert!(out.join("y_9c").join("2021Q1.parquet").exists());
        assert!(!out.join("y_9lp").exists());
        assert!(!out.join("y_9sp").exists());
        Ok(())
    }

    #[test]
    fn caret_file_excludes_separator_row_from_counts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bhcf2112.csv");
        fs::write(
            &input,
            "RSSD9001^BHCK2170\n--------^--------\n111^1\n222^2\n",
        )?;
        let result = process_file(&input, &dir.path().join("out"), &DataDictionary::empty())?;
        assert_eq!(result.variants[0].rows, 2);
        Ok(())
    }

    #[test]
    fn garbage_identifiers_yield_no_tables_but_no_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bhcf2103.csv");
        fs::write(&input, "RSSD9001,BHCK2170\nnot-a-number,1000\n???,2000\n")?;
        let out = dir.path().join("out");

        let result = process_file(&input, &out, &DataDictionary::empty())?;
        assert!(result.variants.is_empty());
        assert_eq!(result.dropped_rows, 2);
        assert!(!out.join("y_9c").exists());
        Ok(())
    }

    #[test]
    fn unknown_rows_are_counted_not_written() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bhcf2103.csv");
        fs::write(
            &input,
            "RSSD9001,BHCK2170,TEXT0001\n111,1000,x\n222,,only-metadata\n",
        )?;
        let result = process_file(&input, &dir.path().join("out"), &DataDictionary::empty())?;
        assert_eq!(result.unknown_rows, 1);
        assert_eq!(result.variants[0].rows, 1);
        Ok(())
    }
}
