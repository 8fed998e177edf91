//! The four-table surveillance archive and its reconciliation with new batches.
//!
//! Reconciliation runs to completion in memory before anything is written,
//! so an integrity failure never leaves a half-merged archive on disk.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::dataset::Dataset;
use crate::domain::{ANALYSIS_ID, TableName};
use crate::error::KiraError;
use crate::fs_util;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    pub summary: Dataset,
    pub pathotypes: Dataset,
    pub amr: Dataset,
    pub mlst: Dataset,
}

impl Archive {
    pub fn table(&self, name: TableName) -> &Dataset {
        match name {
            TableName::Summary => &self.summary,
            TableName::Pathotypes => &self.pathotypes,
            TableName::Amr => &self.amr,
            TableName::Mlst => &self.mlst,
        }
    }

    pub fn table_mut(&mut self, name: TableName) -> &mut Dataset {
        match name {
            TableName::Summary => &mut self.summary,
            TableName::Pathotypes => &mut self.pathotypes,
            TableName::Amr => &mut self.amr,
            TableName::Mlst => &mut self.mlst,
        }
    }

    /// Fills gaps and drops repeated rows in every table.
    pub fn normalize(&mut self) {
        for name in TableName::ALL {
            self.table_mut(name).normalize();
        }
    }

    /// Rejects a summary that lists the same sample twice.
    pub fn ensure_unique_samples(&self) -> Result<(), KiraError> {
        match self.summary.duplicate_keys(ANALYSIS_ID).into_iter().next() {
            Some(sample) => Err(KiraError::DuplicateInBatch {
                table: TableName::Summary.to_string(),
                sample,
            }),
            None => Ok(()),
        }
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            summary: self.summary.len(),
            pathotypes: self.pathotypes.len(),
            amr: self.amr.len(),
            mlst: self.mlst.len(),
        }
    }

    fn from_entries(
        path: &Utf8Path,
        mut entries: indexmap::IndexMap<String, Vec<u8>>,
    ) -> Result<Self, KiraError> {
        let mut archive = Archive::default();
        for name in TableName::ALL {
            let entry = entry_name(name);
            let content = entries.shift_remove(&entry).unwrap_or_default();
            let label = format!("{path}:{entry}");
            *archive.table_mut(name) = Dataset::from_tsv(content.as_slice(), &label)?;
        }
        Ok(archive)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub summary: usize,
    pub pathotypes: usize,
    pub amr: usize,
    pub mlst: usize,
}

/// What the archive path holds right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveProbe {
    pub exists: bool,
    pub tables: Vec<TableName>,
}

impl ArchiveProbe {
    pub fn missing(&self) -> Vec<TableName> {
        TableName::ALL
            .into_iter()
            .filter(|name| !self.tables.contains(name))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.exists && self.missing().is_empty()
    }
}

pub fn probe_archive(path: &Utf8Path) -> Result<ArchiveProbe, KiraError> {
    if !path.as_std_path().exists() {
        return Ok(ArchiveProbe {
            exists: false,
            tables: Vec::new(),
        });
    }
    let names = fs_util::zip_entry_names(path.as_std_path())?;
    let tables = TableName::ALL
        .into_iter()
        .filter(|name| names.contains(&entry_name(*name)))
        .collect();
    Ok(ArchiveProbe {
        exists: true,
        tables,
    })
}

/// State of the merge target before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveState {
    NoArchive,
    PresentValid(Archive),
    PresentInvalid { missing: Vec<TableName> },
}

impl ArchiveState {
    pub fn load(path: &Utf8Path) -> Result<Self, KiraError> {
        let probe = probe_archive(path)?;
        if !probe.exists {
            return Ok(ArchiveState::NoArchive);
        }
        if !probe.is_complete() {
            return Ok(ArchiveState::PresentInvalid {
                missing: probe.missing(),
            });
        }
        let entries = fs_util::read_zip_entries(path.as_std_path())?;
        Ok(ArchiveState::PresentValid(Archive::from_entries(
            path, entries,
        )?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeOutcome {
    Fresh,
    Merged { previous_samples: usize },
    Replaced { missing: Vec<TableName> },
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub archive: Archive,
    pub outcome: MergeOutcome,
}

/// Merges a freshly built batch into whatever archive lives at `source`.
#[derive(Debug, Clone)]
pub struct Reconciler {
    source: Option<Utf8PathBuf>,
}

impl Reconciler {
    pub fn new(source: Option<Utf8PathBuf>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> Option<&Utf8Path> {
        self.source.as_deref()
    }

    pub fn reconcile(&self, batch: Archive) -> Result<Reconciled, KiraError> {
        let state = match &self.source {
            Some(path) => ArchiveState::load(path)?,
            None => ArchiveState::NoArchive,
        };
        let label = self
            .source
            .as_ref()
            .map(|path| path.to_string())
            .unwrap_or_default();
        reconcile_state(state, batch, &label)
    }
}

pub fn reconcile_state(
    state: ArchiveState,
    mut batch: Archive,
    source_label: &str,
) -> Result<Reconciled, KiraError> {
    match state {
        ArchiveState::NoArchive => {
            batch.normalize();
            batch.ensure_unique_samples()?;
            Ok(Reconciled {
                archive: batch,
                outcome: MergeOutcome::Fresh,
            })
        }
        ArchiveState::PresentInvalid { missing } => {
            tracing::warn!(
                archive = source_label,
                ?missing,
                "archive is missing tables; replacing it with this batch"
            );
            batch.normalize();
            batch.ensure_unique_samples()?;
            Ok(Reconciled {
                archive: batch,
                outcome: MergeOutcome::Replaced { missing },
            })
        }
        ArchiveState::PresentValid(existing) => {
            let previous_samples = existing.summary.len();
            let archive = merge_archives(existing, batch, source_label)?;
            Ok(Reconciled {
                archive,
                outcome: MergeOutcome::Merged { previous_samples },
            })
        }
    }
}

/// Appends `batch` to `existing` table by table, after schema and identity checks.
pub fn merge_archives(
    existing: Archive,
    batch: Archive,
    source_label: &str,
) -> Result<Archive, KiraError> {
    for name in TableName::ALL {
        check_schema(name, existing.table(name), batch.table(name))?;
    }

    let known = existing
        .summary
        .column_values(ANALYSIS_ID)
        .collect::<HashSet<_>>();
    if let Some(sample) = batch
        .summary
        .column_values(ANALYSIS_ID)
        .find(|sample| known.contains(sample))
    {
        return Err(KiraError::DuplicateSample {
            sample: sample.to_string(),
            source_path: source_label.to_string(),
        });
    }

    let mut merged = Archive {
        summary: existing.summary.concat(batch.summary),
        pathotypes: existing.pathotypes.concat(batch.pathotypes),
        amr: existing.amr.concat(batch.amr),
        mlst: existing.mlst.concat(batch.mlst),
    };
    merged.normalize();
    merged.ensure_unique_samples()?;
    Ok(merged)
}

/// Tables with rows on both sides must carry the same result columns.
fn check_schema(name: TableName, existing: &Dataset, incoming: &Dataset) -> Result<(), KiraError> {
    if existing.is_empty() || incoming.is_empty() {
        return Ok(());
    }
    let existing_columns = existing.data_columns();
    let incoming_columns = incoming.data_columns();
    // A summary made only of no-data rows carries no result columns at all.
    let sentinel_only = name == TableName::Summary
        && (existing_columns.is_empty() || incoming_columns.is_empty());
    if existing_columns == incoming_columns || sentinel_only {
        return Ok(());
    }
    Err(KiraError::SchemaMismatch {
        table: name.to_string(),
        existing: existing.schema_label(),
        incoming: incoming.schema_label(),
    })
}

fn entry_name(name: TableName) -> String {
    format!("{}.tsv", name.sheet_name())
}

/// Files written for one persisted archive.
#[derive(Debug, Clone, Serialize)]
pub struct PersistedArchive {
    pub artifact: String,
    pub tables: Vec<String>,
}

/// Writes the archive artifact and the standalone TSV tables next to it.
pub fn persist_archive(
    archive: &Archive,
    artifact: &Utf8Path,
    table_dir: &Utf8Path,
) -> Result<PersistedArchive, KiraError> {
    let mut encoded = Vec::new();
    for name in TableName::ALL {
        encoded.push((name, archive.table(name).to_tsv()?));
    }

    let entries = encoded
        .iter()
        .map(|(name, content)| (entry_name(*name), content.clone()))
        .collect::<Vec<_>>();
    fs_util::write_zip_atomic(artifact.as_std_path(), &entries)?;

    let mut tables = Vec::new();
    for (name, content) in &encoded {
        let path = Store::table_path(table_dir, *name);
        Store::write_bytes_atomic(&path, content)?;
        tables.push(path.to_string());
    }

    Ok(PersistedArchive {
        artifact: artifact.to_string(),
        tables,
    })
}
