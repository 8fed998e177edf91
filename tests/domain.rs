use assert_matches::assert_matches;
use serde_json::json;

use kira_wgs_surveillance::domain::{AnalysisId, SectionKind, Species, TableName, render_cell};
use kira_wgs_surveillance::error::KiraError;

#[test]
fn parse_analysis_id_valid() {
    let id: AnalysisId = " EC-2024-0117 ".parse().unwrap();
    assert_eq!(id.as_str(), "EC-2024-0117");
}

#[test]
fn parse_analysis_id_invalid() {
    for value in ["", "EC 01", "runs/EC01"] {
        let err = value.parse::<AnalysisId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidSampleId(_));
    }
}

#[test]
fn parse_species_forms() {
    assert_eq!(
        "Escherichia coli".parse::<Species>().unwrap(),
        Species::EscherichiaColi
    );
    assert_eq!(
        "listeria-monocytogenes".parse::<Species>().unwrap(),
        Species::ListeriaMonocytogenes
    );
    assert_matches!(
        "campylobacter jejuni".parse::<Species>(),
        Err(KiraError::InvalidSpecies(_))
    );
}

#[test]
fn table_names() {
    let sheets = TableName::ALL
        .iter()
        .map(TableName::sheet_name)
        .collect::<Vec<_>>();
    assert_eq!(sheets, vec!["Summary", "Pathotypes", "AMR", "MLST"]);
    assert_eq!(TableName::Amr.file_stem(), "amr");
}

#[test]
fn section_names_are_case_sensitive() {
    assert_eq!(
        SectionKind::from_name("AMRProfile"),
        Some(SectionKind::AmrProfile)
    );
    assert_eq!(SectionKind::from_name("amrprofile"), None);
}

#[test]
fn cells_render_lists_and_skip_empties() {
    assert_eq!(
        render_cell(&json!(["ampicillin", "amoxicillin"])),
        Some("ampicillin, amoxicillin".to_string())
    );
    assert_eq!(render_cell(&json!(99.5)), Some("99.5".to_string()));
    assert_eq!(render_cell(&json!("")), None);
    assert_eq!(render_cell(&json!(null)), None);
}
