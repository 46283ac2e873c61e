// src/fetch/source.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{fs, time::sleep};
use tracing::{info, warn};

use crate::period::Period;

const CHICAGO_FED_BASE_URL: &str =
    "https://www.chicagofed.org/~/media/others/banking/financial-institution-reports/bhc-data";

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Which publisher distributes a given quarter's filing. Chicago Fed hosts
/// 1986 Q3 through 2021 Q1; everything later comes from the FFIEC portal,
/// which has no stable direct-download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    ChicagoFed,
    Ffiec,
}

pub fn source_for(period: Period) -> Source {
    let last_chicago = Period::new(2021, 1).expect("valid cutover quarter");
    if period <= last_chicago {
        Source::ChicagoFed
    } else {
        Source::Ffiec
    }
}

pub fn chicago_fed_url(period: Period) -> String {
    format!("{}/bhcf{}.csv", CHICAGO_FED_BASE_URL, period.quarter_code())
}

/// Download one quarter's filing from the Chicago Fed into `dest_dir` as
/// `bhcf<YYMM>.csv`. Skips silently if the file is already on disk; FFIEC
/// quarters are reported and skipped since they require manual download.
pub async fn download_quarter(
    client: &Client,
    period: Period,
    dest_dir: &Path,
) -> Result<Option<PathBuf>> {
    if source_for(period) == Source::Ffiec {
        warn!(
            period = %period,
            "not hosted by Chicago Fed; download manually from the FFIEC portal"
        );
        return Ok(None);
    }

    let filename = format!("bhcf{}.csv", period.quarter_code());
    let dest_path = dest_dir.join(&filename);
    if dest_path.exists() {
        info!(file = %filename, "already downloaded");
        return Ok(None);
    }

    let url = chicago_fed_url(period);
    let mut attempt = 0;
    let bytes = loop {
        attempt += 1;
        let result = async {
            client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        }
        .await;
        match result {
            Ok(bytes) => break bytes,
            Err(_) if attempt < MAX_RETRIES => {
                sleep(RETRY_DELAY).await;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("downloading {}", url)),
        }
    };

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;
    info!(file = %filename, bytes = bytes.len(), "downloaded");

    Ok(Some(dest_path))
}
