// src/fetch/zips.rs

use anyhow::{Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// FFIEC archives are named like BHCF20210630.zip.
static ZIP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bhcf(\d{4})(\d{2})\d{2}").expect("zip name regex should be valid"));

/// Extract any `BHCF*.zip` archives found in `input_dir`, renaming the
/// contained `BHCF*.TXT` member to the `bhcf<YY><MM>.csv` convention the
/// parser expects. Archives that are malformed or already extracted are
/// skipped with a log line, never fatal.
pub fn extract_zip_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut zips = Vec::new();
    for pattern in ["BHCF*.zip", "bhcf*.zip"] {
        let full = format!("{}/{}", input_dir.display(), pattern);
        for entry in glob(&full).with_context(|| format!("globbing {}", full))? {
            zips.push(entry?);
        }
    }
    zips.sort();
    zips.dedup();

    let mut extracted = Vec::new();
    for zip_path in zips {
        match extract_one(&zip_path, input_dir) {
            Ok(Some(csv_path)) => extracted.push(csv_path),
            Ok(None) => {}
            Err(e) => warn!(zip = %zip_path.display(), "extraction failed: {:#}", e),
        }
    }
    Ok(extracted)
}

fn extract_one(zip_path: &Path, input_dir: &Path) -> Result<Option<PathBuf>> {
    let name = zip_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let caps = match ZIP_NAME_RE.captures(name) {
        Some(caps) => caps,
        None => {
            warn!(zip = %name, "cannot parse quarter from archive name, skipping");
            return Ok(None);
        }
    };
    let year: i32 = caps[1].parse()?;
    let month: u32 = caps[2].parse()?;
    if !matches!(month, 3 | 6 | 9 | 12) {
        warn!(zip = %name, month, "not a quarter-end month, skipping");
        return Ok(None);
    }

    let csv_name = format!("bhcf{:02}{:02}.csv", year.rem_euclid(100), month);
    let csv_path = input_dir.join(&csv_name);
    if csv_path.exists() {
        debug!(zip = %name, csv = %csv_name, "already extracted");
        return Ok(None);
    }

    let file =
        File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("reading {}", zip_path.display()))?;

    let member_idx = (0..archive.len()).find(|&i| {
        archive
            .by_index(i)
            .map(|entry| {
                let entry_name = entry.name().to_uppercase();
                entry.is_file() && entry_name.starts_with("BHCF") && entry_name.ends_with(".TXT")
            })
            .unwrap_or(false)
    });
    let Some(member_idx) = member_idx else {
        warn!(zip = %name, "no BHCF *.TXT member found");
        return Ok(None);
    };

    let mut entry = archive.by_index(member_idx)?;
    let mut out =
        File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?;
    io::copy(&mut entry, &mut out).with_context(|| format!("extracting {}", name))?;

    info!(zip = %name, csv = %csv_name, "extracted");
    Ok(Some(csv_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn write_zip(path: &Path, member: &str, contents: &[u8]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(member, options).unwrap();
        writer.write_all(contents).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_and_renames_txt_member() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_zip(
            &dir.path().join("BHCF20210630.zip"),
            "BHCF20210630.TXT",
            b"RSSD9001^BHCK2170\n111^1\n",
        );

        let extracted = extract_zip_files(dir.path())?;
        assert_eq!(extracted, vec![dir.path().join("bhcf2106.csv")]);
        let contents = std::fs::read_to_string(&extracted[0])?;
        assert!(contents.starts_with("RSSD9001^"));
        Ok(())
    }

    #[test]
    fn skips_when_csv_already_present() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("bhcf2106.csv"), "existing")?;
        write_zip(
            &dir.path().join("BHCF20210630.zip"),
            "BHCF20210630.TXT",
            b"new contents",
        );

        let extracted = extract_zip_files(dir.path())?;
        assert!(extracted.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("bhcf2106.csv"))?,
            "existing"
        );
        Ok(())
    }

    #[test]
    fn bad_archive_is_not_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("BHCF20210630.zip"), b"not a zip")?;
        let extracted = extract_zip_files(dir.path())?;
        assert!(extracted.is_empty());
        Ok(())
    }

    #[test]
    fn archive_without_txt_member_is_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_zip(
            &dir.path().join("BHCF20210630.zip"),
            "README.md",
            b"nothing useful",
        );
        let extracted = extract_zip_files(dir.path())?;
        assert!(extracted.is_empty());
        Ok(())
    }
}
