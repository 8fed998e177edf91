use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid sample id: {0}")]
    InvalidSampleId(String),

    #[error("invalid species: {0}")]
    InvalidSpecies(String),

    #[error("missing config file {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing required option: {0}")]
    #[diagnostic(help("pass it on the command line or set it in kira-wgs.json"))]
    MissingOption(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("malformed result document {path}: {message}")]
    Document { path: PathBuf, message: String },

    #[error("malformed table {path}: {message}")]
    Table { path: String, message: String },

    #[error("failed to read archive {path}: {message}")]
    ArchiveRead { path: String, message: String },

    #[error("column schema of table {table} does not match the archive (archive: [{existing}], new: [{incoming}])")]
    #[diagnostic(help("archives only accept batches with the same columns; start a new archive instead"))]
    SchemaMismatch {
        table: String,
        existing: String,
        incoming: String,
    },

    #[error("sample {sample} is already present in {source_path}")]
    #[diagnostic(help("remove the sample from this batch or merge into a different archive"))]
    DuplicateSample { sample: String, source_path: String },

    #[error("sample {sample} appears more than once in table {table} of this batch")]
    DuplicateInBatch { table: String, sample: String },

    #[error("column names in {path} do not match the other allele tables")]
    ColumnMismatch { path: String },

    #[error("run directory already exists: {0}")]
    #[diagnostic(help("remove the previous run or choose a different run name"))]
    RunExists(String),

    #[error("failed to launch pipeline: {0}")]
    PipelineLaunch(String),

    #[error("no samples found in input")]
    NoSamples,
}

impl KiraError {
    /// Failures that would corrupt or duplicate archive history.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            KiraError::SchemaMismatch { .. }
                | KiraError::DuplicateSample { .. }
                | KiraError::DuplicateInBatch { .. }
                | KiraError::ColumnMismatch { .. }
        )
    }
}
