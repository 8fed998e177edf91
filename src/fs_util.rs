use std::fs;
use std::io::{self, Write};
use std::path::Path;

use indexmap::IndexMap;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::KiraError;

/// Names of the file entries in a zip artifact.
pub fn zip_entry_names(zip_path: &Path) -> Result<Vec<String>, KiraError> {
    let mut archive = open_zip(zip_path)?;
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|err| archive_err(zip_path, err))?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

/// Reads every file entry of a zip artifact into memory, in archive order.
pub fn read_zip_entries(zip_path: &Path) -> Result<IndexMap<String, Vec<u8>>, KiraError> {
    let mut archive = open_zip(zip_path)?;
    let mut entries = IndexMap::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| archive_err(zip_path, err))?;
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            return Err(KiraError::ArchiveRead {
                path: zip_path.display().to_string(),
                message: "zip entry path traversal detected".to_string(),
            });
        }
        let mut content = Vec::new();
        io::copy(&mut entry, &mut content).map_err(|err| archive_err(zip_path, err))?;
        entries.insert(entry.name().to_string(), content);
    }
    Ok(entries)
}

/// Writes `entries` into a fresh zip at `zip_path`, replacing it only once complete.
pub fn write_zip_atomic(zip_path: &Path, entries: &[(String, Vec<u8>)]) -> Result<(), KiraError> {
    let parent = zip_path
        .parent()
        .ok_or_else(|| KiraError::Filesystem("invalid archive path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-wgs-archive")
        .tempfile_in(parent)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(temp.as_file_mut());
    for (name, content) in entries {
        writer
            .start_file(name.as_str(), options)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        writer
            .write_all(content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    writer
        .finish()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    temp.persist(zip_path)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

fn open_zip(zip_path: &Path) -> Result<ZipArchive<fs::File>, KiraError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| KiraError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    ZipArchive::new(file).map_err(|err| archive_err(zip_path, err))
}

fn archive_err(zip_path: &Path, err: impl std::fmt::Display) -> KiraError {
    KiraError::ArchiveRead {
        path: zip_path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_entries_survive_write_and_read() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("report.zip");
        let entries = vec![
            ("Summary.tsv".to_string(), b"Analysis_ID\nS1\n".to_vec()),
            ("MLST.tsv".to_string(), Vec::new()),
        ];
        write_zip_atomic(&path, &entries).unwrap();

        assert_eq!(zip_entry_names(&path).unwrap(), vec!["Summary.tsv", "MLST.tsv"]);
        let read = read_zip_entries(&path).unwrap();
        assert_eq!(read["Summary.tsv"], b"Analysis_ID\nS1\n".to_vec());
        assert!(read["MLST.tsv"].is_empty());
    }

    #[test]
    fn not_a_zip_is_an_archive_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("report.zip");
        fs::write(&path, b"plain text").unwrap();
        let err = zip_entry_names(&path).unwrap_err();
        assert!(matches!(err, KiraError::ArchiveRead { .. }));
    }
}
