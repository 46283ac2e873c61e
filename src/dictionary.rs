// src/dictionary.rs

use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{collections::HashMap, fs::File, path::Path};
use tracing::{debug, info, warn};

/// Read-only mapping from canonical variable name (e.g. "BHCK2170") to its
/// short description, produced by the external dictionary-processing step.
/// Constructed once and passed by reference into each worker; an absent or
/// unreadable dictionary degrades to an empty map and annotation becomes a
/// no-op, never a pipeline failure.
#[derive(Debug, Default, Clone)]
pub struct DataDictionary {
    descriptions: HashMap<String, String>,
}

impl DataDictionary {
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        Self {
            descriptions: pairs.into_iter().collect(),
        }
    }

    /// Load Variable -> ItemName pairs from the dictionary parquet.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "data dictionary not found, continuing without metadata");
            return Self::empty();
        }
        match Self::read_parquet(path) {
            Ok(dict) => {
                info!(path = %path.display(), entries = dict.len(), "loaded data dictionary");
                dict
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to load data dictionary: {:#}", e);
                Self::empty()
            }
        }
    }

    fn read_parquet(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening dictionary {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("reading dictionary parquet metadata")?
            .build()
            .context("building dictionary parquet reader")?;

        let mut descriptions = HashMap::new();
        for batch in reader {
            let batch = batch.context("reading dictionary batch")?;
            let variables = string_column(&batch, "Variable")?;
            let names = string_column(&batch, "ItemName")?;
            for i in 0..batch.num_rows() {
                if variables.is_null(i) || names.is_null(i) {
                    continue;
                }
                descriptions.insert(variables.value(i).to_string(), names.value(i).to_string());
            }
        }
        Ok(Self { descriptions })
    }

    pub fn describe(&self, variable: &str) -> Option<&str> {
        self.descriptions.get(variable).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

fn string_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("dictionary is missing a {} string column", name))
}
