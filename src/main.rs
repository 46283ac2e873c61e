use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use y9scraper::{
    batch::{self, BatchOptions, FileStatus, RunReport},
    dictionary::DataDictionary,
    fetch,
    period::Period,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Scrape FR Y-9 holding company filings into a quarterly parquet archive"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download quarterly filings from the Chicago Fed (1986 Q3 - 2021 Q1)
    Download {
        #[arg(long, default_value = "data/raw")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 1986)]
        start_year: i32,
        #[arg(long, default_value_t = 3)]
        start_quarter: u32,
        #[arg(long, default_value_t = 2021)]
        end_year: i32,
        #[arg(long, default_value_t = 1)]
        end_quarter: u32,
    },
    /// Parse downloaded filings into the per-schedule parquet archive
    Parse {
        #[arg(long, default_value = "data/raw")]
        input_dir: PathBuf,
        #[arg(long, default_value = "data/processed")]
        output_dir: PathBuf,
        /// Data dictionary parquet; defaults to <output-dir>/data_dictionary.parquet
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Worker count (default: all CPUs)
        #[arg(long)]
        workers: Option<usize>,
        /// Process files sequentially
        #[arg(long)]
        no_parallel: bool,
        /// Only process filings from this year onwards
        #[arg(long)]
        start_year: Option<i32>,
        /// Only process filings up to this year
        #[arg(long)]
        end_year: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    match Cli::parse().command {
        Command::Download {
            output_dir,
            start_year,
            start_quarter,
            end_year,
            end_quarter,
        } => {
            run_download(output_dir, start_year, start_quarter, end_year, end_quarter).await?;
        }
        Command::Parse {
            input_dir,
            output_dir,
            dictionary,
            workers,
            no_parallel,
            start_year,
            end_year,
        } => {
            let workers = if no_parallel {
                1
            } else {
                workers.unwrap_or_else(num_cpus::get)
            };
            let report = tokio::task::spawn_blocking(move || {
                run_parse(input_dir, output_dir, dictionary, workers, start_year, end_year)
            })
            .await??;
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn run_download(
    output_dir: PathBuf,
    start_year: i32,
    start_quarter: u32,
    end_year: i32,
    end_quarter: u32,
) -> Result<()> {
    fs::create_dir_all(&output_dir)?;
    let client = Client::new();

    let mut period = Period::new(start_year, start_quarter)?;
    let end = Period::new(end_year, end_quarter)?;
    let mut downloaded = 0usize;
    while period <= end {
        if fetch::source::download_quarter(&client, period, &output_dir)
            .await?
            .is_some()
        {
            downloaded += 1;
            // Politeness delay between hits to the publisher.
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        period = period.next();
    }

    info!(downloaded, "download complete");
    Ok(())
}

fn run_parse(
    input_dir: PathBuf,
    output_dir: PathBuf,
    dictionary: Option<PathBuf>,
    workers: usize,
    start_year: Option<i32>,
    end_year: Option<i32>,
) -> Result<RunReport> {
    fs::create_dir_all(&output_dir)?;

    let extracted = fetch::zips::extract_zip_files(&input_dir)?;
    if !extracted.is_empty() {
        info!(count = extracted.len(), "extracted ZIP archives");
    }

    let dict_path = dictionary.unwrap_or_else(|| output_dir.join("data_dictionary.parquet"));
    let dict = DataDictionary::load(&dict_path);

    let opts = BatchOptions {
        input_dir,
        output_dir: output_dir.clone(),
        workers,
        start_year,
        end_year,
    };
    let report = batch::run(&opts, &dict)?;
    report.write_json(&output_dir.join("run_report.json"))?;

    for outcome in &report.outcomes {
        let quarter = outcome.quarter.as_deref().unwrap_or("????");
        match outcome.status {
            FileStatus::Success => info!("[{}] {}", quarter, outcome.message),
            FileStatus::Skipped => info!("[{}] skipped: {}", quarter, outcome.message),
            FileStatus::Error => error!("[{}] {}: {}", quarter, outcome.file, outcome.message),
        }
    }
    info!(
        succeeded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        "parse summary"
    );
    if report.outcomes.is_empty() {
        warn!("no filing files found to process");
    }

    Ok(report)
}
