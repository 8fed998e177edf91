//! Cumulative cgMLST allele-hash matrix, one row per sample.

use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;

use crate::dataset::Dataset;
use crate::error::KiraError;
use crate::store::Store;

pub const HASHED_RESULTS: &str = "_hashed_results.tsv";
const CONTIGS_SUFFIX: &str = "_contigs.fa";

#[derive(Debug, Clone, Default)]
pub struct AlleleMatrix {
    table: Dataset,
    source: String,
}

impl AlleleMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a previous run's matrix; a missing file starts empty.
    pub fn load(path: &Utf8Path) -> Result<Self, KiraError> {
        if !path.as_std_path().exists() {
            return Ok(Self::new());
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
        Ok(Self {
            table: Dataset::from_tsv(file, path.as_str())?,
            source: path.to_string(),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Appends one sample's allele table after strict column and identity checks.
    pub fn append(&mut self, mut table: Dataset, label: &str) -> Result<(), KiraError> {
        let Some(key) = table.first_column().map(str::to_string) else {
            tracing::warn!(table = label, "allele table has no columns; skipped");
            return Ok(());
        };
        table.map_column(&key, |value| {
            value
                .strip_suffix(CONTIGS_SUFFIX)
                .unwrap_or(value)
                .to_string()
        });

        if self.table.column_count() == 0 {
            self.table = table;
            self.source = label.to_string();
            return Ok(());
        }
        if !self.table.same_columns(&table) {
            return Err(KiraError::ColumnMismatch {
                path: label.to_string(),
            });
        }

        let existing_key = self.table.first_column().unwrap_or(&key).to_string();
        let known = self
            .table
            .column_values(&existing_key)
            .collect::<HashSet<_>>();
        if let Some(sample) = table.column_values(&key).find(|sample| known.contains(sample)) {
            return Err(KiraError::DuplicateSample {
                sample: sample.to_string(),
                source_path: if self.source.is_empty() {
                    label.to_string()
                } else {
                    self.source.clone()
                },
            });
        }

        self.table = std::mem::take(&mut self.table).concat(table);
        Ok(())
    }

    /// Appends `<sample_dir>/*/_hashed_results.tsv` when exactly one exists.
    pub fn append_sample_dir(&mut self, sample_dir: &Utf8Path) -> Result<bool, KiraError> {
        let mut found = Store::find_in_subdirs(sample_dir, HASHED_RESULTS)?;
        match found.len() {
            0 => {
                tracing::warn!(%sample_dir, "no allele hash file found");
                Ok(false)
            }
            1 => {
                let path = found.remove(0);
                let file = fs::File::open(path.as_std_path())
                    .map_err(|err| KiraError::Filesystem(format!("open {path}: {err}")))?;
                let table = Dataset::from_tsv(file, path.as_str())?;
                self.append(table, path.as_str())?;
                Ok(true)
            }
            _ => {
                tracing::warn!(%sample_dir, "multiple allele hash files found; check the run outputs");
                Ok(false)
            }
        }
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), KiraError> {
        Store::write_bytes_atomic(path, &self.table.to_tsv()?)
    }
}
