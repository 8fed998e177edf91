use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::domain::AnalysisId;
use crate::error::KiraError;
use crate::store::{self, Store};

/// Where the raw reads of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A directory of FASTQ files named `<sample>_...`.
    FastqDir(Utf8PathBuf),
    /// A headerless TSV of `sample<TAB>fq1<TAB>fq2`.
    SampleSheet(Utf8PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInput {
    pub sample: AnalysisId,
    pub files: Vec<Utf8PathBuf>,
}

/// Groups input files by sample, in first-seen order.
pub fn collect_inputs(source: &InputSource) -> Result<Vec<SampleInput>, KiraError> {
    let grouped = match source {
        InputSource::FastqDir(dir) => group_fastq_dir(dir)?,
        InputSource::SampleSheet(path) => group_sample_sheet(path)?,
    };
    if grouped.is_empty() {
        return Err(KiraError::NoSamples);
    }
    Ok(grouped
        .into_iter()
        .map(|(sample, files)| SampleInput { sample, files })
        .collect())
}

/// Copies each sample's files into `<run_dir>/<sample>/` and returns those directories.
pub fn distribute(
    inputs: &[SampleInput],
    run_dir: &Utf8Path,
) -> Result<Vec<(AnalysisId, Utf8PathBuf)>, KiraError> {
    let mut sample_dirs = Vec::new();
    for input in inputs {
        let sample_dir = Store::sample_dir(run_dir, &input.sample);
        fs::create_dir_all(sample_dir.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        for file in &input.files {
            let name = file
                .file_name()
                .ok_or_else(|| KiraError::InvalidInput(format!("not a file: {file}")))?;
            Store::copy_file_atomic(file, &sample_dir.join(name))?;
        }
        tracing::debug!(sample = %input.sample, files = input.files.len(), "sample inputs distributed");
        sample_dirs.push((input.sample.clone(), sample_dir));
    }
    Ok(sample_dirs)
}

fn group_fastq_dir(dir: &Utf8Path) -> Result<IndexMap<AnalysisId, Vec<Utf8PathBuf>>, KiraError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| KiraError::Filesystem(err.to_string()))?
            .path();
        if path.is_file() {
            files.push(store::utf8(path)?);
        }
    }
    files.sort();

    let mut grouped = IndexMap::<AnalysisId, Vec<Utf8PathBuf>>::new();
    for file in files {
        let name = file.file_name().unwrap_or_default();
        let sample = sample_from_file_name(name)?;
        grouped.entry(sample).or_default().push(file);
    }
    Ok(grouped)
}

/// Sample name is the file name up to the first underscore.
pub fn sample_from_file_name(name: &str) -> Result<AnalysisId, KiraError> {
    let stem = name.split_once('_').map(|(stem, _)| stem).unwrap_or(name);
    stem.parse()
}

fn group_sample_sheet(path: &Utf8Path) -> Result<IndexMap<AnalysisId, Vec<Utf8PathBuf>>, KiraError> {
    let table_err = |message: String| KiraError::Table {
        path: path.to_string(),
        message,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_std_path())
        .map_err(|err| table_err(err.to_string()))?;

    let mut grouped = IndexMap::<AnalysisId, Vec<Utf8PathBuf>>::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| table_err(err.to_string()))?;
        let fields = record.iter().map(str::trim).collect::<Vec<_>>();
        let [sample, fq1, fq2, ..] = fields.as_slice() else {
            return Err(table_err(format!(
                "line {}: expected sample, fq1 and fq2",
                line + 1
            )));
        };
        let sample: AnalysisId = sample.parse()?;
        let files = grouped.entry(sample).or_default();
        files.push(Utf8PathBuf::from(*fq1));
        files.push(Utf8PathBuf::from(*fq2));
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = store::utf8(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn sample_name_stops_at_underscore() {
        assert_eq!(
            sample_from_file_name("EC001_S1_L001_R1.fastq.gz").unwrap().as_str(),
            "EC001"
        );
        assert_eq!(sample_from_file_name("EC002.fastq.gz").unwrap().as_str(), "EC002.fastq.gz");
    }

    #[test]
    fn fastq_dir_groups_pairs() {
        let (_temp, root) = temp_root();
        let fastq = root.join("fastq");
        fs::create_dir_all(fastq.as_std_path()).unwrap();
        for name in ["B_R1.fq.gz", "A_R2.fq.gz", "A_R1.fq.gz", "B_R2.fq.gz"] {
            fs::write(fastq.join(name).as_std_path(), b"@r\nACGT\n+\nIIII\n").unwrap();
        }

        let inputs = collect_inputs(&InputSource::FastqDir(fastq)).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].sample.as_str(), "A");
        assert_eq!(inputs[0].files.len(), 2);

        let run_dir = root.join("run");
        let dirs = distribute(&inputs, &run_dir).unwrap();
        assert!(dirs[1].1.join("B_R2.fq.gz").as_std_path().exists());
    }

    #[test]
    fn sample_sheet_needs_three_fields() {
        let (_temp, root) = temp_root();
        let sheet = root.join("samples.tsv");
        fs::write(sheet.as_std_path(), "S1\t/r/S1_1.fq\t/r/S1_2.fq\nS2\t/r/S2_1.fq\n").unwrap();
        assert_matches!(
            collect_inputs(&InputSource::SampleSheet(sheet)),
            Err(KiraError::Table { message, .. }) if message.starts_with("line 2")
        );
    }

    #[test]
    fn empty_fastq_dir_has_no_samples() {
        let (_temp, root) = temp_root();
        assert_matches!(
            collect_inputs(&InputSource::FastqDir(root)),
            Err(KiraError::NoSamples)
        );
    }
}
