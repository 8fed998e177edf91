//! Section-aware flattening of nested result documents.
//!
//! Every function takes its accumulator by value and hands it back, so no
//! state survives between unrelated calls. Leaf keys that repeat across
//! nested mappings overwrite each other (last write wins) while keeping the
//! position of their first appearance.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::domain::SectionKind;
use crate::profile::{self, GeneProfiles};

/// A single-level field/value mapping in document order.
pub type FlatRecord = IndexMap<String, Value>;

/// Handler for a named section: consumes the section and returns its flat contribution.
pub type SectionHandler = fn(Map<String, Value>, &mut GeneProfiles) -> FlatRecord;

pub fn handler_for(kind: SectionKind) -> SectionHandler {
    match kind {
        SectionKind::Fastp | SectionKind::CgMlstQc | SectionKind::SpeciesDetermination => {
            verbatim_handler
        }
        SectionKind::ContaminationCheck | SectionKind::AssemblyQualityStatistics => {
            recursive_handler
        }
        SectionKind::PredictedSerotype => serotype_handler,
        SectionKind::PredictedPathotype => profile::pathotype_rule,
        SectionKind::AmrProfile => profile::amr_rule,
        SectionKind::MlstSequenceType => profile::mlst_rule,
    }
}

fn verbatim_handler(section: Map<String, Value>, _: &mut GeneProfiles) -> FlatRecord {
    parse_section_return_dict(section)
}

fn recursive_handler(section: Map<String, Value>, _: &mut GeneProfiles) -> FlatRecord {
    parse_unspecified_section(section)
}

fn serotype_handler(section: Map<String, Value>, _: &mut GeneProfiles) -> FlatRecord {
    profile::serotype_rule(section)
}

/// Flattens `record` into `acc`, dispatching registered sections to their handlers.
pub fn flatten_sections(
    mut acc: FlatRecord,
    record: Map<String, Value>,
    profiles: &mut GeneProfiles,
) -> FlatRecord {
    for (key, value) in record {
        match value {
            Value::Object(section) => match SectionKind::from_name(&key) {
                Some(kind) => {
                    let contribution = handler_for(kind)(section, profiles);
                    acc.extend(contribution);
                }
                None => acc = flatten_sections(acc, section, profiles),
            },
            leaf => {
                acc.insert(key, leaf);
            }
        }
    }
    acc
}

/// Recursive flattening with no section rules.
pub fn flatten_generic(mut acc: FlatRecord, record: Map<String, Value>) -> FlatRecord {
    for (key, value) in record {
        match value {
            Value::Object(nested) => acc = flatten_generic(acc, nested),
            leaf => {
                acc.insert(key, leaf);
            }
        }
    }
    acc
}

pub fn parse_unspecified_section(section: Map<String, Value>) -> FlatRecord {
    flatten_generic(FlatRecord::new(), section)
}

/// Copies an already-flat section one level deep.
pub fn parse_section_return_dict(section: Map<String, Value>) -> FlatRecord {
    section.into_iter().collect()
}
