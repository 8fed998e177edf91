//! Extraction rules for sections that carry gene-level detail.
//!
//! Each rule consumes its section, parks the gene/allele list in the
//! sample's [`GeneProfiles`] and returns what is left for the summary row.

use serde_json::{Map, Value};

use crate::flatten::{self, FlatRecord};

const GENE_LIST: &str = "GeneList";
const SEQ_VARIATIONS: &str = "seq_variations";
const SOFTWARE: &str = "Software";

pub const PATHOTYPE_SOFTWARE: &str = "PathotypePrediction_Software";
pub const AMR_SOFTWARE: &str = "AMRProfile_Software";
pub const MLST_SOFTWARE: &str = "MLSTProfile_Software";
pub const SEROTYPE_SOFTWARE: &str = "SerotypePrediction_Software";

/// Gene-level side tables collected while flattening one sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneProfiles {
    pub pathotype: Option<Vec<Map<String, Value>>>,
    pub amr: Option<Vec<Map<String, Value>>>,
    pub mlst: Option<Map<String, Value>>,
}

impl GeneProfiles {
    pub fn is_empty(&self) -> bool {
        self.pathotype.is_none() && self.amr.is_none() && self.mlst.is_none()
    }
}

pub fn serotype_rule(section: Map<String, Value>) -> FlatRecord {
    match (section.get("Serotype"), section.get(SOFTWARE)) {
        (Some(serotype), Some(software)) => FlatRecord::from([
            ("Serotype".to_string(), serotype.clone()),
            (SEROTYPE_SOFTWARE.to_string(), software.clone()),
        ]),
        _ => {
            tracing::debug!("serotype section lacks Serotype/Software; omitted");
            FlatRecord::new()
        }
    }
}

pub fn pathotype_rule(mut section: Map<String, Value>, profiles: &mut GeneProfiles) -> FlatRecord {
    match section.shift_remove(GENE_LIST) {
        Some(list) => profiles.pathotype = Some(records(list, "PredictedPathotype")),
        None => tracing::warn!("PredictedPathotype section has no GeneList"),
    }
    let mut flat = flatten::parse_unspecified_section(section);
    rename_software(&mut flat, PATHOTYPE_SOFTWARE);
    flat
}

pub fn amr_rule(mut section: Map<String, Value>, profiles: &mut GeneProfiles) -> FlatRecord {
    match section.shift_remove(SEQ_VARIATIONS) {
        Some(list) => profiles.amr = Some(records(list, "AMRProfile")),
        None => tracing::warn!("AMRProfile section has no seq_variations"),
    }
    section.shift_remove(GENE_LIST);
    let mut flat = flatten::parse_section_return_dict(section);
    rename_software(&mut flat, AMR_SOFTWARE);
    flat
}

pub fn mlst_rule(mut section: Map<String, Value>, profiles: &mut GeneProfiles) -> FlatRecord {
    match section.shift_remove(GENE_LIST) {
        Some(Value::Object(alleles)) => profiles.mlst = Some(alleles),
        Some(Value::Array(items)) => {
            profiles.mlst = items.into_iter().find_map(|item| match item {
                Value::Object(alleles) => Some(alleles),
                _ => None,
            });
        }
        Some(_) => tracing::warn!("MLSTSequenceType GeneList is neither a list nor a mapping"),
        None => tracing::warn!("MLSTSequenceType section has no GeneList"),
    }
    let mut flat = flatten::parse_section_return_dict(section);
    rename_software(&mut flat, MLST_SOFTWARE);
    flat
}

fn rename_software(flat: &mut FlatRecord, target: &str) {
    if let Some(software) = flat.shift_remove(SOFTWARE) {
        flat.insert(target.to_string(), software);
    }
}

fn records(list: Value, section: &str) -> Vec<Map<String, Value>> {
    let Value::Array(items) = list else {
        tracing::warn!(section, "gene list is not a list; ignored");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            other => {
                tracing::warn!(section, entry = %other, "skipping non-record gene entry");
                None
            }
        })
        .collect()
}
