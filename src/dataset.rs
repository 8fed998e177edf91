use std::collections::HashSet;
use std::io::Read;

use indexmap::{IndexMap, IndexSet};

use crate::domain::{ANALYSIS_ID, QC_VOTE, QUALITY_CHECK_SECTIONS, SENTINEL};
use crate::error::KiraError;

/// One table row: column name to cell text. Absent keys are gaps.
pub type Row = IndexMap<String, String>;

/// Ordered rows sharing the union of their keys as column schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: IndexSet<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut dataset = Self::new();
        for row in rows {
            dataset.push_row(row);
        }
        dataset
    }

    pub fn push_row(&mut self, row: Row) {
        for column in row.keys() {
            if !self.columns.contains(column) {
                self.columns.insert(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn first_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    /// Same column names, in any order.
    pub fn same_columns(&self, other: &Dataset) -> bool {
        self.columns.len() == other.columns.len()
            && self.columns.iter().all(|column| other.columns.contains(column))
    }

    /// Rewrites the cells of `column` in place.
    pub fn map_column(&mut self, column: &str, mut f: impl FnMut(&str) -> String) {
        for row in &mut self.rows {
            if let Some(value) = row.get_mut(column) {
                *value = f(value);
            }
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|row| row.get(column))
            .map(String::as_str)
    }

    /// Values of `column` in row order; gaps are skipped.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column).map(String::as_str))
    }

    /// Moves an existing column to `index` (clamped to the last position).
    pub fn move_column(&mut self, column: &str, index: usize) {
        if let Some(from) = self.columns.get_index_of(column) {
            let to = index.min(self.columns.len() - 1);
            self.columns.move_index(from, to);
        }
    }

    /// Writes the sentinel into every gap and rebuilds rows in column order.
    pub fn fill_missing(&mut self) {
        let columns = &self.columns;
        for row in &mut self.rows {
            let filled = columns
                .iter()
                .map(|column| {
                    let value = row
                        .get(column)
                        .filter(|value| !value.is_empty())
                        .cloned()
                        .unwrap_or_else(|| SENTINEL.to_string());
                    (column.clone(), value)
                })
                .collect::<Row>();
            *row = filled;
        }
    }

    /// Drops rows equal, cell for cell, to an earlier row.
    pub fn drop_duplicates(&mut self) {
        let columns = &self.columns;
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key = columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or_default())
                .collect::<Vec<_>>();
            seen.insert(key)
        });
    }

    pub fn normalize(&mut self) {
        self.fill_missing();
        self.drop_duplicates();
    }

    /// Appends `other`'s rows after this dataset's rows.
    pub fn concat(mut self, other: Dataset) -> Dataset {
        for row in other.rows {
            self.push_row(row);
        }
        self
    }

    /// Values of `key` that occur on more than one row, in first-seen order.
    pub fn duplicate_keys(&self, key: &str) -> Vec<String> {
        let mut counts = IndexMap::<&str, usize>::new();
        for value in self.column_values(key) {
            *counts.entry(value).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(value, _)| value.to_string())
            .collect()
    }

    /// Columns that carry results, as opposed to identity or no-data markers.
    pub fn data_columns(&self) -> IndexSet<&str> {
        self.columns()
            .filter(|column| !is_bookkeeping_column(column))
            .collect()
    }

    pub fn schema_label(&self) -> String {
        self.columns().collect::<Vec<_>>().join(", ")
    }

    pub fn to_tsv(&self) -> Result<Vec<u8>, KiraError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        if !self.columns.is_empty() {
            writer
                .write_record(self.columns())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            for row in &self.rows {
                writer
                    .write_record(
                        self.columns()
                            .map(|column| row.get(column).map(String::as_str).unwrap_or("")),
                    )
                    .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            }
        }
        writer
            .into_inner()
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    /// Reads a tab-separated table with a header line; empty input is an empty dataset.
    pub fn from_tsv<R: Read>(reader: R, label: &str) -> Result<Self, KiraError> {
        let table_err = |err: csv::Error| KiraError::Table {
            path: label.to_string(),
            message: err.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers().map_err(table_err)?.clone();

        let mut dataset = Self::new();
        for header in &headers {
            dataset.columns.insert(header.to_string());
        }
        for record in reader.records() {
            let record = record.map_err(table_err)?;
            let row = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(header, value)| (header.to_string(), value.to_string()))
                .collect::<Row>();
            dataset.rows.push(row);
        }
        Ok(dataset)
    }
}

fn is_bookkeeping_column(column: &str) -> bool {
    column == ANALYSIS_ID || column == QC_VOTE || QUALITY_CHECK_SECTIONS.contains(&column)
}

pub fn row<K: Into<String>, V: Into<String>>(cells: impl IntoIterator<Item = (K, V)>) -> Row {
    cells
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
