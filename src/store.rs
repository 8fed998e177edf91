use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{AnalysisId, TableName};
use crate::error::KiraError;

pub const ALLELES_FILE: &str = "alleles.tsv";

/// Directory layout of runs below an output root.
#[derive(Debug, Clone)]
pub struct Store {
    output_root: Utf8PathBuf,
}

impl Store {
    pub fn new(output_root: Utf8PathBuf) -> Self {
        Self { output_root }
    }

    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    pub fn run_dir(&self, run_name: &str) -> Utf8PathBuf {
        self.output_root.join(run_name)
    }

    pub fn sample_dir(run_dir: &Utf8Path, sample: &AnalysisId) -> Utf8PathBuf {
        run_dir.join(sample.as_str())
    }

    /// `<run_dir>/<run_name>_report.zip`, where the run name is the directory name.
    pub fn archive_path(run_dir: &Utf8Path) -> Utf8PathBuf {
        let run_name = run_dir.file_name().unwrap_or("run");
        run_dir.join(format!("{run_name}_report.zip"))
    }

    pub fn table_path(dir: &Utf8Path, table: TableName) -> Utf8PathBuf {
        dir.join(format!("{}.tsv", table.file_stem()))
    }

    pub fn alleles_path(dir: &Utf8Path) -> Utf8PathBuf {
        dir.join(ALLELES_FILE)
    }

    /// Creates a new run directory; an existing one is never reused.
    pub fn create_run_dir(&self, run_name: &str) -> Result<Utf8PathBuf, KiraError> {
        let run_dir = self.run_dir(run_name);
        if run_dir.as_std_path().exists() {
            return Err(KiraError::RunExists(run_dir.to_string()));
        }
        fs::create_dir_all(run_dir.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(run_dir)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), KiraError> {
        let parent = dest
            .parent()
            .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("kira-wgs-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        fs::copy(source.as_std_path(), temp.path())
            .map_err(|err| KiraError::Filesystem(format!("copy {source}: {err}")))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Files called `file_name` exactly one directory below `dir`, sorted by path.
    pub fn find_in_subdirs(dir: &Utf8Path, file_name: &str) -> Result<Vec<Utf8PathBuf>, KiraError> {
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| KiraError::Filesystem(err.to_string()))?;
            let candidate = entry.path().join(file_name);
            if entry.path().is_dir() && candidate.is_file() {
                found.push(utf8(candidate)?);
            }
        }
        found.sort();
        Ok(found)
    }
}

pub fn utf8(path: PathBuf) -> Result<Utf8PathBuf, KiraError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| KiraError::Filesystem(format!("non-utf8 path: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new(Utf8PathBuf::from("/data/out"));
        let run_dir = store.run_dir("run_efsa");
        assert_eq!(run_dir, Utf8PathBuf::from("/data/out/run_efsa"));
        assert!(Store::archive_path(&run_dir).ends_with("run_efsa/run_efsa_report.zip"));
        assert!(Store::table_path(&run_dir, TableName::Amr).ends_with("run_efsa/amr.tsv"));
        let sample: AnalysisId = "S1".parse().unwrap();
        assert!(Store::sample_dir(&run_dir, &sample).ends_with("run_efsa/S1"));
    }

    #[test]
    fn run_dir_is_never_reused() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::new(utf8(temp.path().to_path_buf()).unwrap());
        store.create_run_dir("run1").unwrap();
        assert_matches!(store.create_run_dir("run1"), Err(KiraError::RunExists(_)));
    }

    #[test]
    fn finds_files_one_level_down() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("out_a").as_std_path()).unwrap();
        fs::create_dir_all(root.join("work").as_std_path()).unwrap();
        fs::write(root.join("out_a/_parseresults.json").as_std_path(), b"{}").unwrap();
        fs::write(root.join("_parseresults.json").as_std_path(), b"{}").unwrap();

        let found = Store::find_in_subdirs(&root, "_parseresults.json").unwrap();
        assert_eq!(found, vec![root.join("out_a/_parseresults.json")]);
    }
}
