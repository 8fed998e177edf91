use std::fs;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::alleles::AlleleMatrix;
use crate::archive::{
    self, ArchiveProbe, ArchiveState, MergeOutcome, PersistedArchive, Reconciler, TableCounts,
};
use crate::builder::DatasetBuilder;
use crate::document::{self, LOG_DOCUMENT, RESULT_DOCUMENT, RawDocument};
use crate::domain::{AnalysisId, QC_FAIL, QC_PASS};
use crate::error::KiraError;
use crate::input::{self, InputSource};
use crate::pipeline::{self, PipelineOutcome, PipelineRunner, SampleResults};
use crate::sample::{SampleParser, SampleRecord};
use crate::store::{self, Store};

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_name: String,
    pub input: InputSource,
    pub previous_run: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Existing archive to extend; absent means a fresh one.
    pub archive: Option<Utf8PathBuf>,
    pub output: Utf8PathBuf,
    pub documents: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_name: String,
    pub run_dir: String,
    pub started_at: String,
    pub finished_at: String,
    pub samples: Vec<SampleReport>,
    pub outcome: MergeOutcome,
    pub counts: TableCounts,
    pub archive: PersistedArchive,
    pub alleles: Option<AlleleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub sample: String,
    pub pipeline: Option<PipelineOutcome>,
    pub qc_vote: String,
    pub results: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlleleReport {
    pub path: String,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub path: String,
    pub probe: ArchiveProbe,
    pub counts: Option<TableCounts>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

#[derive(Clone)]
pub struct App<P: PipelineRunner> {
    store: Store,
    pipeline: P,
}

impl<P: PipelineRunner> App<P> {
    pub fn new(store: Store, pipeline: P) -> Self {
        Self { store, pipeline }
    }

    /// Full surveillance run: distribute, analyse, tabulate, reconcile, persist.
    pub fn run(&self, request: RunRequest, sink: &dyn ProgressSink) -> Result<RunResult, KiraError> {
        let started_at = iso_timestamp();
        let previous_run = request
            .previous_run
            .as_deref()
            .map(resolve_previous_run)
            .transpose()?;
        let inputs = input::collect_inputs(&request.input)?;
        let run_dir = self.store.create_run_dir(&request.run_name)?;

        phase(
            sink,
            format!("phase=Prepare; distributing {} samples", inputs.len()),
        );
        let sample_dirs = input::distribute(&inputs, &run_dir)?;

        let total = sample_dirs.len();
        let mut records = Vec::with_capacity(total);
        let mut samples = Vec::with_capacity(total);
        for (index, (sample, sample_dir)) in sample_dirs.iter().enumerate() {
            phase(
                sink,
                format!("phase=Pipeline; sample {sample} ({}/{total})", index + 1),
            );
            let start = Instant::now();
            let outcome = self.pipeline.run(sample, sample_dir.as_std_path())?;
            sink.event(ProgressEvent {
                message: format!("pipeline.finished sample={sample}"),
                elapsed: Some(start.elapsed()),
            });

            let (record, report) = parse_sample(sample, sample_dir)?;
            records.push(record);
            samples.push(SampleReport {
                pipeline: Some(outcome),
                ..report
            });
        }

        let previous_archive = previous_run.as_deref().map(Store::archive_path);
        let alleles_seed = previous_run.as_deref().map(Store::alleles_path);

        phase(sink, "phase=Build; tabulating results".to_string());
        let batch = DatasetBuilder::build(&records)?;

        phase(sink, "phase=Reconcile; merging with previous archive".to_string());
        let reconciled = Reconciler::new(previous_archive).reconcile(batch)?;

        let mut matrix = match &alleles_seed {
            Some(path) => AlleleMatrix::load(path)?,
            None => AlleleMatrix::new(),
        };
        for (_, sample_dir) in &sample_dirs {
            matrix.append_sample_dir(sample_dir)?;
        }

        phase(sink, "phase=Store; writing archive".to_string());
        let persisted = archive::persist_archive(
            &reconciled.archive,
            &Store::archive_path(&run_dir),
            &run_dir,
        )?;
        let alleles = if matrix.dataset().column_count() > 0 {
            let path = Store::alleles_path(&run_dir);
            matrix.write(&path)?;
            Some(AlleleReport {
                path: path.to_string(),
                samples: matrix.len(),
            })
        } else {
            None
        };

        tracing::info!(
            run = %request.run_name,
            samples = total,
            outcome = ?reconciled.outcome,
            "run complete"
        );
        Ok(RunResult {
            run_name: request.run_name,
            run_dir: run_dir.to_string(),
            started_at,
            finished_at: iso_timestamp(),
            samples,
            outcome: reconciled.outcome,
            counts: reconciled.archive.counts(),
            archive: persisted,
            alleles,
        })
    }

    /// Rebuilds tables from existing result documents and merges them into `archive`.
    pub fn merge(
        &self,
        request: MergeRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        let started_at = iso_timestamp();
        if request.documents.is_empty() {
            return Err(KiraError::NoSamples);
        }

        phase(
            sink,
            format!("phase=Parse; reading {} result documents", request.documents.len()),
        );
        let mut records = Vec::new();
        let mut samples = Vec::new();
        for path in &request.documents {
            let (record, report) = parse_document_file(path)?;
            records.push(record);
            samples.push(report);
        }

        phase(sink, "phase=Build; tabulating results".to_string());
        let batch = DatasetBuilder::build(&records)?;

        phase(sink, "phase=Reconcile; merging with archive".to_string());
        let reconciled = Reconciler::new(request.archive.clone()).reconcile(batch)?;

        phase(sink, "phase=Store; writing archive".to_string());
        fs::create_dir_all(request.output.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let persisted = archive::persist_archive(
            &reconciled.archive,
            &Store::archive_path(&request.output),
            &request.output,
        )?;

        Ok(RunResult {
            run_name: request.output.file_name().unwrap_or_default().to_string(),
            run_dir: request.output.to_string(),
            started_at,
            finished_at: iso_timestamp(),
            samples,
            outcome: reconciled.outcome,
            counts: reconciled.archive.counts(),
            archive: persisted,
            alleles: None,
        })
    }

    pub fn inspect(&self, path: &Utf8Path, sink: &dyn ProgressSink) -> Result<InspectResult, KiraError> {
        phase(sink, format!("phase=Resolve; probing {path}"));
        let probe = archive::probe_archive(path)?;
        let counts = match ArchiveState::load(path)? {
            ArchiveState::PresentValid(archive) => Some(archive.counts()),
            ArchiveState::NoArchive | ArchiveState::PresentInvalid { .. } => None,
        };
        Ok(InspectResult {
            path: path.to_string(),
            probe,
            counts,
        })
    }
}

/// A previous run must be an existing directory; its name locates the archive.
fn resolve_previous_run(dir: &Utf8Path) -> Result<Utf8PathBuf, KiraError> {
    if !dir.as_std_path().is_dir() {
        return Err(KiraError::InvalidInput(format!(
            "previous run {dir} is not an existing directory"
        )));
    }
    store::utf8(
        dir.as_std_path()
            .canonicalize()
            .map_err(|err| KiraError::Filesystem(format!("resolve {dir}: {err}")))?,
    )
}

fn parse_sample(
    sample: &AnalysisId,
    sample_dir: &Utf8Path,
) -> Result<(SampleRecord, SampleReport), KiraError> {
    let parser = SampleParser::new(sample.clone());
    let (record, vote, results) = match pipeline::locate_results(sample_dir)? {
        SampleResults::Found(dir) => {
            let doc = document::load_result_document(dir.join(RESULT_DOCUMENT).as_std_path())?;
            let vote = if doc.is_empty() {
                tracing::warn!(%sample, "result document is empty; sample treated as failed");
                pipeline::failure_vote(sample_dir)?
            } else {
                QC_PASS.to_string()
            };
            let record = parser.with_qc_vote(vote.clone()).parse_document(doc);
            (record, vote, Some(dir.to_string()))
        }
        SampleResults::Missing => {
            let vote = pipeline::failure_vote(sample_dir)?;
            let record = parser.with_qc_vote(vote.clone()).parse_document(Default::default());
            (record, vote, None)
        }
        SampleResults::Ambiguous(paths) => {
            tracing::warn!(%sample, count = paths.len(), "multiple result documents; sample treated as failed");
            let vote = pipeline::failure_vote(sample_dir)?;
            let record = parser.with_qc_vote(vote.clone()).parse_document(Default::default());
            (record, vote, None)
        }
    };
    Ok((
        record,
        SampleReport {
            sample: sample.to_string(),
            pipeline: None,
            qc_vote: vote,
            results,
        },
    ))
}

/// Sample id is the name of the directory holding the document.
fn parse_document_file(path: &Utf8Path) -> Result<(SampleRecord, SampleReport), KiraError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    let canonical = store::utf8(
        dir.as_std_path()
            .canonicalize()
            .map_err(|err| KiraError::Filesystem(format!("resolve {dir}: {err}")))?,
    )?;
    let sample: AnalysisId = canonical
        .file_name()
        .ok_or_else(|| KiraError::InvalidInput(format!("cannot name sample for {path}")))?
        .parse()?;

    let parser = SampleParser::new(sample.clone());
    let exists = path.as_std_path().exists();
    let doc = if exists {
        document::load_result_document(path.as_std_path())?
    } else {
        tracing::warn!(%sample, %path, "result document not found");
        RawDocument::new()
    };
    let vote = if doc.is_empty() {
        if exists {
            tracing::warn!(%sample, %path, "result document is empty; sample treated as failed");
        }
        document::failure_title(dir.join(LOG_DOCUMENT).as_std_path())?
            .unwrap_or_else(|| QC_FAIL.to_string())
    } else {
        QC_PASS.to_string()
    };
    let record = parser.with_qc_vote(vote.clone()).parse_document(doc);
    let results = exists.then(|| path.to_string());
    Ok((
        record,
        SampleReport {
            sample: sample.to_string(),
            pipeline: None,
            qc_vote: vote,
            results,
        },
    ))
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
