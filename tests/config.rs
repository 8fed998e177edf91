use std::path::PathBuf;

use assert_matches::assert_matches;

use kira_wgs_surveillance::config::{Config, ConfigLoader, ConfigOverrides, DEFAULT_RUN_NAME};
use kira_wgs_surveillance::domain::Species;
use kira_wgs_surveillance::error::KiraError;

#[test]
fn parse_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-wgs.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "workflow": "/opt/efsa/onehealth.nf",
            "nextflow_config": "/opt/efsa/local.config",
            "species": "salmonella_enterica",
            "read_type": "dual"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.species, Some(Species::SalmonellaEnterica));
    assert_eq!(resolved.run_name, DEFAULT_RUN_NAME);

    let settings = resolved.pipeline_settings().unwrap();
    assert_eq!(settings.workflow, PathBuf::from("/opt/efsa/onehealth.nf"));
    assert_eq!(settings.read_type, "dual");
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-wgs.json");
    std::fs::write(&path, "{ species: ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(KiraError::ConfigParse(_))
    );
}

#[test]
fn command_line_overrides_config() {
    let resolved = ConfigLoader::resolve_config(Config {
        species: Some("listeria monocytogenes".to_string()),
        run_name: Some("from_file".to_string()),
        ..Config::default()
    })
    .unwrap()
    .apply(ConfigOverrides {
        species: Some(Species::EscherichiaColi),
        run_name: Some("from_cli".to_string()),
        ..ConfigOverrides::default()
    });

    assert_eq!(resolved.species, Some(Species::EscherichiaColi));
    assert_eq!(resolved.run_name, "from_cli");
    assert_matches!(
        resolved.pipeline_settings(),
        Err(KiraError::MissingOption(_))
    );
}
