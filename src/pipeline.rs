use std::path::{Path, PathBuf};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::document::{self, LOG_DOCUMENT, RESULT_DOCUMENT};
use crate::domain::{AnalysisId, QC_FAIL, Species};
use crate::error::KiraError;
use crate::store::Store;

const RESULTS_DIR_SKIP: &str = "work";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub nextflow: PathBuf,
    pub workflow: PathBuf,
    pub config: PathBuf,
    pub species: Species,
    pub read_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Completed,
    Failed { message: String },
}

/// Runs the analysis pipeline for one sample directory. Never retried.
pub trait PipelineRunner {
    fn run(&self, sample: &AnalysisId, sample_dir: &Path) -> Result<PipelineOutcome, KiraError>;
}

#[derive(Debug, Clone)]
pub struct NextflowRunner {
    settings: PipelineSettings,
}

impl NextflowRunner {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-C".to_string(),
            self.settings.config.to_string_lossy().to_string(),
            "run".to_string(),
            self.settings.workflow.to_string_lossy().to_string(),
            format!("--readType={}", self.settings.read_type),
            format!("--species={}", self.settings.species.pipeline_name()),
            "--indir".to_string(),
            ".".to_string(),
            "--outdir".to_string(),
            ".".to_string(),
        ]
    }
}

impl PipelineRunner for NextflowRunner {
    fn run(&self, sample: &AnalysisId, sample_dir: &Path) -> Result<PipelineOutcome, KiraError> {
        let args = self.args();
        tracing::info!(
            %sample,
            command = %format!("{} {}", self.settings.nextflow.display(), args.join(" ")),
            "running pipeline"
        );
        let output = Command::new(&self.settings.nextflow)
            .args(&args)
            .current_dir(sample_dir)
            .output()
            .map_err(|err| {
                KiraError::PipelineLaunch(format!("{}: {err}", self.settings.nextflow.display()))
            })?;
        if output.status.success() {
            return Ok(PipelineOutcome::Completed);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("pipeline exited with {}", output.status)
        } else {
            stderr.lines().last().unwrap_or_default().to_string()
        };
        tracing::warn!(%sample, %message, "pipeline run failed");
        Ok(PipelineOutcome::Failed { message })
    }
}

/// Where a sample's result document ended up after its pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleResults {
    Found(Utf8PathBuf),
    Missing,
    Ambiguous(Vec<Utf8PathBuf>),
}

/// Looks for `<sample_dir>/*/_parseresults.json`, ignoring the pipeline work dir.
pub fn locate_results(sample_dir: &Utf8Path) -> Result<SampleResults, KiraError> {
    let mut documents = Store::find_in_subdirs(sample_dir, RESULT_DOCUMENT)?
        .into_iter()
        .filter(|path| !in_work_dir(sample_dir, path))
        .collect::<Vec<_>>();
    match documents.len() {
        0 => Ok(SampleResults::Missing),
        1 => {
            let document = documents.remove(0);
            let dir = document.parent().unwrap_or(sample_dir).to_path_buf();
            Ok(SampleResults::Found(dir))
        }
        _ => Ok(SampleResults::Ambiguous(documents)),
    }
}

/// QC vote for a sample without results: the title of its failure record.
pub fn failure_vote(sample_dir: &Utf8Path) -> Result<String, KiraError> {
    for log in Store::find_in_subdirs(sample_dir, LOG_DOCUMENT)? {
        if let Some(title) = document::failure_title(log.as_std_path())? {
            return Ok(title);
        }
    }
    Ok(QC_FAIL.to_string())
}

fn in_work_dir(sample_dir: &Utf8Path, path: &Utf8Path) -> bool {
    path.strip_prefix(sample_dir)
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|first| first.as_str().starts_with(RESULTS_DIR_SKIP))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::store::utf8;

    fn sample_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let dir = utf8(temp.path().join("S1")).unwrap();
        fs::create_dir_all(dir.as_std_path()).unwrap();
        (temp, dir)
    }

    #[test]
    fn command_line_matches_pipeline_interface() {
        let runner = NextflowRunner::new(PipelineSettings {
            nextflow: PathBuf::from("nextflow"),
            workflow: PathBuf::from("/opt/efsa/onehealth.nf"),
            config: PathBuf::from("/opt/efsa/local.config"),
            species: Species::EscherichiaColi,
            read_type: "dual".to_string(),
        });
        assert_eq!(
            runner.args(),
            vec![
                "-C",
                "/opt/efsa/local.config",
                "run",
                "/opt/efsa/onehealth.nf",
                "--readType=dual",
                "--species=escherichia coli",
                "--indir",
                ".",
                "--outdir",
                "."
            ]
        );
    }

    #[test]
    fn locate_single_result_dir() {
        let (_temp, dir) = sample_dir();
        fs::create_dir_all(dir.join("S1_out").as_std_path()).unwrap();
        fs::create_dir_all(dir.join("work").as_std_path()).unwrap();
        fs::write(dir.join("S1_out").join(RESULT_DOCUMENT).as_std_path(), b"{}").unwrap();
        fs::write(dir.join("work").join(RESULT_DOCUMENT).as_std_path(), b"{}").unwrap();

        assert_eq!(
            locate_results(&dir).unwrap(),
            SampleResults::Found(dir.join("S1_out"))
        );
    }

    #[test]
    fn locate_missing_and_ambiguous() {
        let (_temp, dir) = sample_dir();
        assert_eq!(locate_results(&dir).unwrap(), SampleResults::Missing);

        for name in ["a", "b"] {
            fs::create_dir_all(dir.join(name).as_std_path()).unwrap();
            fs::write(dir.join(name).join(RESULT_DOCUMENT).as_std_path(), b"{}").unwrap();
        }
        assert!(matches!(
            locate_results(&dir).unwrap(),
            SampleResults::Ambiguous(paths) if paths.len() == 2
        ));
    }

    #[test]
    fn failure_vote_reads_log_title() {
        let (_temp, dir) = sample_dir();
        assert_eq!(failure_vote(&dir).unwrap(), QC_FAIL);

        fs::create_dir_all(dir.join("S1_out").as_std_path()).unwrap();
        fs::write(
            dir.join("S1_out").join(LOG_DOCUMENT).as_std_path(),
            br#"{"title": "Assembly failed QC", "level": "error"}"#,
        )
        .unwrap();
        assert_eq!(failure_vote(&dir).unwrap(), "Assembly failed QC");
    }
}
