use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_wgs_surveillance::domain::{AnalysisId, TableName};
use kira_wgs_surveillance::error::KiraError;
use kira_wgs_surveillance::store::{Store, utf8};

#[test]
fn layout_paths() {
    let store = Store::new(Utf8PathBuf::from("/srv/wgs"));
    let run_dir = store.run_dir("2024_w17");
    let sample: AnalysisId = "EC0117".parse().unwrap();

    assert!(Store::archive_path(&run_dir).ends_with("2024_w17/2024_w17_report.zip"));
    assert!(Store::table_path(&run_dir, TableName::Mlst).ends_with("2024_w17/mlst.tsv"));
    assert!(Store::alleles_path(&run_dir).ends_with("2024_w17/alleles.tsv"));
    assert!(Store::sample_dir(&run_dir, &sample).ends_with("2024_w17/EC0117"));
}

#[test]
fn run_directory_is_created_once() {
    let temp = tempfile::tempdir().unwrap();
    let store = Store::new(utf8(temp.path().to_path_buf()).unwrap());
    let run_dir = store.create_run_dir("week1").unwrap();
    assert!(run_dir.as_std_path().is_dir());
    assert_matches!(store.create_run_dir("week1"), Err(KiraError::RunExists(_)));
}

#[test]
fn atomic_writes_replace_content() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8(temp.path().to_path_buf()).unwrap();
    let path = root.join("nested").join("summary.tsv");
    Store::write_bytes_atomic(&path, b"a\n").unwrap();
    Store::write_bytes_atomic(&path, b"b\n").unwrap();
    assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"b\n");

    let copy = root.join("copy").join("summary.tsv");
    Store::copy_file_atomic(&path, &copy).unwrap();
    assert_eq!(std::fs::read(copy.as_std_path()).unwrap(), b"b\n");
}
