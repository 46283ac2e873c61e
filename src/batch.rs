// src/batch.rs

use anyhow::{Context, Result};
use glob::glob;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::dictionary::DataDictionary;
use crate::period::Period;
use crate::process::{self, FileResult};
use crate::process::classify::FilerType;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Bounded worker count; 1 means sequential.
    pub workers: usize,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Skipped,
    Error,
}

/// Tagged per-file result collected across the worker pool. Workers never
/// throw across the pool boundary; failures land here as `Error`.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<String>,
    pub status: FileStatus,
    pub message: String,
    #[serde(skip)]
    pub period: Option<Period>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    pub fn count(&self, status: FileStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(FileStatus::Success)
    }

    pub fn skipped(&self) -> usize {
        self.count(FileStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(FileStatus::Error)
    }

    /// Persist the report as JSON next to the archive. Written to a tmp file
    /// then renamed so a crashed run never leaves a truncated report.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let tmp_path = path.with_extension("json.tmp");
        let mut tmp = std::fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        serde_json::to_writer_pretty(&mut tmp, self).context("serializing run report")?;
        tmp.write_all(b"\n")?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
        Ok(())
    }
}

/// Find candidate filings in `input_dir`, both filename casings, sorted.
pub fn discover_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in ["bhcf*.csv", "BHCF*.csv"] {
        let full = format!("{}/{}", input_dir.display(), pattern);
        for entry in glob(&full).with_context(|| format!("globbing {}", full))? {
            files.push(entry?);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn output_exists(output_dir: &Path, period: Period) -> bool {
    let name = format!("{}.parquet", period.label());
    FilerType::ALL
        .iter()
        .any(|f| output_dir.join(f.dir_name()).join(&name).exists())
}

fn in_year_range(period: Period, opts: &BatchOptions) -> bool {
    if let Some(start) = opts.start_year {
        if period.year() < start {
            return false;
        }
    }
    if let Some(end) = opts.end_year {
        if period.year() > end {
            return false;
        }
    }
    true
}

fn summary_message(result: &FileResult) -> String {
    if result.variants.is_empty() {
        return "no rows for any schedule".to_string();
    }
    let parts: Vec<String> = result.variants.iter().map(|v| v.to_string()).collect();
    parts.join(" | ")
}

fn process_one(path: &Path, opts: &BatchOptions, dict: &DataDictionary) -> FileOutcome {
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let period = Period::from_filename(&file).ok();

    if let Some(p) = period {
        if output_exists(&opts.output_dir, p) {
            return FileOutcome {
                file,
                quarter: Some(p.label()),
                status: FileStatus::Skipped,
                message: "output already exists".to_string(),
                period,
            };
        }
    }

    match process::process_file(path, &opts.output_dir, dict) {
        Ok(result) => FileOutcome {
            file,
            quarter: Some(result.period.label()),
            status: FileStatus::Success,
            message: summary_message(&result),
            period: Some(result.period),
        },
        Err(e) => {
            error!(file = %file, "processing failed: {:#}", e);
            FileOutcome {
                file,
                quarter: period.map(|p| p.label()),
                status: FileStatus::Error,
                message: format!("{:#}", e),
                period,
            }
        }
    }
}

/// Run every discovered filing through the pipeline on a bounded worker
/// pool. Files are fully independent; one failure never aborts the rest.
/// Outcomes come back sorted by period for presentation.
pub fn run(opts: &BatchOptions, dict: &DataDictionary) -> Result<RunReport> {
    let mut files = discover_files(&opts.input_dir)?;

    if opts.start_year.is_some() || opts.end_year.is_some() {
        files.retain(|path| {
            let name = match path.file_name().and_then(|s| s.to_str()) {
                Some(n) => n,
                None => return false,
            };
            match Period::from_filename(name) {
                Ok(p) => in_year_range(p, opts),
                Err(_) => false,
            }
        });
    }

    info!(
        files = files.len(),
        workers = opts.workers,
        input = %opts.input_dir.display(),
        output = %opts.output_dir.display(),
        "starting batch"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers.max(1))
        .build()
        .context("building worker pool")?;

    let mut outcomes: Vec<FileOutcome> =
        pool.install(|| files.par_iter().map(|p| process_one(p, opts, dict)).collect());

    outcomes.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.file.cmp(&b.file)));

    Ok(RunReport { outcomes })
}
