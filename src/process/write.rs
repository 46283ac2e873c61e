// src/process/write.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Int64Array, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::dictionary::DataDictionary;
use crate::process::classify::VariantTable;
use crate::process::normalize::ID_COLUMN;

pub const PERIOD_COLUMN: &str = "REPORTING_PERIOD";

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date is valid");
    (date - epoch).num_days() as i32
}

/// Attach dictionary descriptions as field-level metadata. Operates on the
/// schema only; row count, column order and data arrays are untouched.
/// Fields with no dictionary match pass through unchanged.
pub fn annotate_fields(fields: Vec<Field>, dict: &DataDictionary) -> Vec<Field> {
    fields
        .into_iter()
        .map(|field| match dict.describe(field.name()) {
            Some(desc) => {
                let meta = HashMap::from([("description".to_string(), desc.to_string())]);
                field.with_metadata(meta)
            }
            None => field,
        })
        .collect()
}

/// Build the columnar form of a variant table: identifier, quarter-end date,
/// then the schedule-prefixed value columns as nullable text (empty source
/// fields become nulls).
pub fn build_batch(table: &VariantTable, dict: &DataDictionary) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.headers.len() + 2);
    fields.push(Field::new(ID_COLUMN, DataType::Int64, false));
    fields.push(Field::new(PERIOD_COLUMN, DataType::Date32, false));
    for header in &table.headers {
        fields.push(Field::new(header, DataType::Utf8, true));
    }
    let schema = Arc::new(Schema::new(annotate_fields(fields, dict)));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(table.headers.len() + 2);
    columns.push(Arc::new(Int64Array::from(table.ids.clone())));

    let day = days_since_epoch(table.period.end_date());
    columns.push(Arc::new(Date32Array::from(vec![day; table.ids.len()])));

    for col in 0..table.headers.len() {
        let mut builder = StringBuilder::new();
        for row in &table.rows {
            let value = row[col].trim();
            if value.is_empty() {
                builder.append_null();
            } else {
                builder.append_value(value);
            }
        }
        columns.push(Arc::new(builder.finish()));
    }

    RecordBatch::try_new(schema, columns).context("building variant record batch")
}

/// Write one variant table to a temp path next to its final location,
/// returning (tmp, final) for a later rename.
fn stage_variant(
    table: &VariantTable,
    out_dir: &Path,
    dict: &DataDictionary,
) -> Result<(PathBuf, PathBuf)> {
    let batch = build_batch(table, dict)?;

    let variant_dir = out_dir.join(table.filer_type.dir_name());
    fs::create_dir_all(&variant_dir)
        .with_context(|| format!("creating {}", variant_dir.display()))?;

    let out_path = variant_dir.join(format!("{}.parquet", table.period.label()));
    let tmp_path = out_path.with_extension("tmp");

    let file = File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing variant batch")?;
    writer.close().context("closing parquet writer")?;

    debug!(
        path = %out_path.display(),
        rows = table.ids.len(),
        vars = table.headers.len(),
        "staged variant table"
    );
    Ok((tmp_path, out_path))
}

/// Persist every (period, variant) table for one filing under
/// `out_dir/<variant>/<label>.parquet`. All tables are staged to temp paths
/// before any rename, so a file that fails part way leaves no final output
/// behind and is retried, not skipped, on the next run.
pub fn write_variants(
    tables: &[VariantTable],
    out_dir: &Path,
    dict: &DataDictionary,
) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(tables.len());
    for table in tables {
        match stage_variant(table, out_dir, dict) {
            Ok(paths) => staged.push(paths),
            Err(e) => {
                for (tmp_path, _) in &staged {
                    let _ = fs::remove_file(tmp_path);
                }
                return Err(e);
            }
        }
    }

    let mut written = Vec::with_capacity(staged.len());
    for (idx, (tmp_path, out_path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp_path, out_path) {
            for (tmp_path, _) in &staged[idx..] {
                let _ = fs::remove_file(tmp_path);
            }
            return Err(e).with_context(|| {
                format!("renaming {} -> {}", tmp_path.display(), out_path.display())
            });
        }
        written.push(out_path.clone());
    }
    Ok(written)
}
