use std::path::Path;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use kira_wgs_surveillance::alleles::HASHED_RESULTS;
use kira_wgs_surveillance::app::{App, RunRequest};
use kira_wgs_surveillance::archive::{ArchiveState, MergeOutcome};
use kira_wgs_surveillance::dataset::Dataset;
use kira_wgs_surveillance::document::{LOG_DOCUMENT, RESULT_DOCUMENT};
use kira_wgs_surveillance::domain::{AnalysisId, QC_FAIL, QC_PASS, TableName};
use kira_wgs_surveillance::error::KiraError;
use kira_wgs_surveillance::input::InputSource;
use kira_wgs_surveillance::output::JsonOutput;
use kira_wgs_surveillance::pipeline::{PipelineOutcome, PipelineRunner};
use kira_wgs_surveillance::store::{Store, utf8};

/// Samples named in `failing` leave only a log document behind; samples in
/// `blank` leave a zero-byte result document.
#[derive(Default)]
struct MockPipeline {
    failing: Vec<String>,
    blank: Vec<String>,
}

impl PipelineRunner for MockPipeline {
    fn run(&self, sample: &AnalysisId, sample_dir: &Path) -> Result<PipelineOutcome, KiraError> {
        let out = sample_dir.join(format!("{sample}_out"));
        std::fs::create_dir_all(&out).unwrap();

        if self.failing.iter().any(|name| name == sample.as_str()) {
            std::fs::write(
                out.join(LOG_DOCUMENT),
                br#"[{"title": "Insufficient coverage", "level": "error"}]"#,
            )
            .unwrap();
            return Ok(PipelineOutcome::Failed {
                message: "exit status: 1".to_string(),
            });
        }

        if self.blank.iter().any(|name| name == sample.as_str()) {
            std::fs::write(out.join(RESULT_DOCUMENT), b"").unwrap();
            return Ok(PipelineOutcome::Completed);
        }

        std::fs::write(
            out.join(RESULT_DOCUMENT),
            br#"{
                "QualityCheck": {"Fastp": {"TotalReads": 900000}},
                "Results": {
                    "PredictedPathotype": {"GeneList": [{"Gene": "eae"}], "Software": "VirulenceFinder"},
                    "MLSTSequenceType": {"ST": "11", "GeneList": [{"adk": "12", "recA": "2"}], "Software": "mlst"}
                }
            }"#,
        )
        .unwrap();
        std::fs::write(
            out.join(HASHED_RESULTS),
            format!("FILE\tlocus1\tlocus2\n{sample}_contigs.fa\th1\th2\n"),
        )
        .unwrap();
        Ok(PipelineOutcome::Completed)
    }
}

fn workspace(samples: &[&str]) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path().to_path_buf()).unwrap();
    let fastq = root.join("fastq");
    std::fs::create_dir_all(fastq.as_std_path()).unwrap();
    for sample in samples {
        for read in ["R1", "R2"] {
            std::fs::write(
                fastq.join(format!("{sample}_{read}.fastq")).as_std_path(),
                b"@r\nACGT\n+\nIIII\n",
            )
            .unwrap();
        }
    }
    (temp, root)
}

fn request(root: &Utf8Path, fastq: &str, name: &str, previous: Option<Utf8PathBuf>) -> RunRequest {
    RunRequest {
        run_name: name.to_string(),
        input: InputSource::FastqDir(root.join(fastq)),
        previous_run: previous,
    }
}

#[test]
fn failed_sample_keeps_a_sentinel_row_with_its_log_title() {
    let (_temp, root) = workspace(&["EC01", "EC02"]);
    let pipeline = MockPipeline {
        failing: vec!["EC02".to_string()],
        ..MockPipeline::default()
    };
    let app = App::new(Store::new(root.join("runs")), pipeline);

    let result = app
        .run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap();

    assert_eq!(result.samples[0].qc_vote, QC_PASS);
    assert_eq!(result.samples[1].qc_vote, "Insufficient coverage");
    assert_matches!(
        result.samples[1].pipeline,
        Some(PipelineOutcome::Failed { .. })
    );
    assert_eq!(result.counts.summary, 2);
    assert_eq!(result.counts.pathotypes, 1);
    assert_eq!(result.counts.mlst, 1);

    let alleles = result.alleles.unwrap();
    assert_eq!(alleles.samples, 1);
    let table = Dataset::from_tsv(std::fs::File::open(&alleles.path).unwrap(), "alleles").unwrap();
    assert_eq!(table.cell(0, "FILE"), Some("EC01"));
}

#[test]
fn previous_run_seeds_archive_and_alleles() {
    let (_temp, root) = workspace(&["EC01"]);
    let fastq2 = root.join("fastq2");
    std::fs::create_dir_all(fastq2.as_std_path()).unwrap();
    std::fs::write(fastq2.join("EC03_R1.fastq").as_std_path(), b"@r\nA\n+\nI\n").unwrap();

    let store = Store::new(root.join("runs"));
    let app = App::new(store.clone(), MockPipeline::default());
    app.run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap();

    let result = app
        .run(
            request(&root, "fastq2", "week2", Some(store.run_dir("week1"))),
            &JsonOutput,
        )
        .unwrap();
    assert_eq!(result.outcome, MergeOutcome::Merged { previous_samples: 1 });
    assert_eq!(result.counts.summary, 2);
    assert_eq!(result.alleles.map(|alleles| alleles.samples), Some(2));

    let archive = Store::archive_path(&store.run_dir("week2"));
    let ArchiveState::PresentValid(stored) = ArchiveState::load(&archive).unwrap() else {
        panic!("expected a complete archive");
    };
    assert_eq!(
        stored.mlst.columns().take(2).collect::<Vec<_>>(),
        vec!["Analysis_ID", "ST"]
    );
}

#[test]
fn existing_run_directory_is_not_reused() {
    let (_temp, root) = workspace(&["EC01"]);
    let store = Store::new(root.join("runs"));
    std::fs::create_dir_all(store.run_dir("week1").as_std_path()).unwrap();

    let app = App::new(store, MockPipeline::default());
    let err = app
        .run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, KiraError::RunExists(_));
}

#[test]
fn empty_result_document_does_not_vote_pass() {
    let (_temp, root) = workspace(&["EC01", "EC02"]);
    let pipeline = MockPipeline {
        blank: vec!["EC01".to_string()],
        ..MockPipeline::default()
    };
    let app = App::new(Store::new(root.join("runs")), pipeline);

    let result = app
        .run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap();
    assert_eq!(result.samples[0].qc_vote, QC_FAIL);
    assert_eq!(result.samples[1].qc_vote, QC_PASS);

    let summary = Store::table_path(&Utf8PathBuf::from(&result.run_dir), TableName::Summary);
    let table = Dataset::from_tsv(std::fs::File::open(summary.as_std_path()).unwrap(), "summary").unwrap();
    assert_eq!(table.cell(0, "Analysis_ID"), Some("EC01"));
    assert_eq!(table.cell(0, "QC_VOTE"), Some(QC_FAIL));
}

#[test]
fn missing_previous_run_is_rejected_before_anything_runs() {
    let (_temp, root) = workspace(&["EC01"]);
    let store = Store::new(root.join("runs"));
    let app = App::new(store.clone(), MockPipeline::default());
    app.run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap();

    let err = app
        .run(
            request(&root, "fastq", "week2", Some(root.join("runs/week1_typo"))),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, KiraError::InvalidInput(_));
    assert!(!store.run_dir("week2").as_std_path().exists());
}

#[test]
fn previous_run_path_without_a_final_name_still_finds_its_archive() {
    let (_temp, root) = workspace(&["EC01"]);
    let store = Store::new(root.join("runs"));
    let app = App::new(store.clone(), MockPipeline::default());
    app.run(request(&root, "fastq", "week1", None), &JsonOutput)
        .unwrap();

    let indirect = store.run_dir("week1").join("EC01").join("..");
    let err = app
        .run(request(&root, "fastq", "week2", Some(indirect)), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, KiraError::DuplicateSample { ref sample, .. } if sample == "EC01");
}
