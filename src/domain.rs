use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KiraError;

/// Placeholder written into every cell that has no data.
pub const SENTINEL: &str = "-";

pub const ANALYSIS_ID: &str = "Analysis_ID";
pub const QC_VOTE: &str = "QC_VOTE";
pub const SEQUENCE_TYPE: &str = "ST";

/// Top-level categories of a result document, one per analysis phase.
pub const QUALITY_CHECK_SECTIONS: [&str; 2] = ["QualityCheck", "Results"];

pub const QC_PASS: &str = "PASS";
pub const QC_FAIL: &str = "FAIL";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisId(String);

impl AnalysisId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnalysisId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.chars().any(char::is_whitespace)
            && !trimmed.contains('/');
        if !is_valid {
            return Err(KiraError::InvalidSampleId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Species {
    ListeriaMonocytogenes,
    SalmonellaEnterica,
    EscherichiaColi,
}

impl Species {
    /// Name as the pipeline expects it on its command line.
    pub fn pipeline_name(&self) -> &'static str {
        match self {
            Species::ListeriaMonocytogenes => "listeria monocytogenes",
            Species::SalmonellaEnterica => "salmonella enterica",
            Species::EscherichiaColi => "escherichia coli",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pipeline_name())
    }
}

impl FromStr for Species {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ");
        match normalized.as_str() {
            "listeria monocytogenes" => Ok(Species::ListeriaMonocytogenes),
            "salmonella enterica" => Ok(Species::SalmonellaEnterica),
            "escherichia coli" => Ok(Species::EscherichiaColi),
            _ => Err(KiraError::InvalidSpecies(value.to_string())),
        }
    }
}

/// The four tables of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableName {
    Summary,
    Pathotypes,
    Amr,
    Mlst,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::Summary,
        TableName::Pathotypes,
        TableName::Amr,
        TableName::Mlst,
    ];

    /// Name of the table inside the archive artifact.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            TableName::Summary => "Summary",
            TableName::Pathotypes => "Pathotypes",
            TableName::Amr => "AMR",
            TableName::Mlst => "MLST",
        }
    }

    /// Stem of the standalone TSV file.
    pub fn file_stem(&self) -> &'static str {
        match self {
            TableName::Summary => "summary",
            TableName::Pathotypes => "pathotypes",
            TableName::Amr => "amr",
            TableName::Mlst => "mlst",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sheet_name())
    }
}

/// Named sections of a result document that are not blindly recursed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Fastp,
    ContaminationCheck,
    AssemblyQualityStatistics,
    CgMlstQc,
    SpeciesDetermination,
    PredictedSerotype,
    PredictedPathotype,
    AmrProfile,
    MlstSequenceType,
}

impl SectionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Fastp" => Some(SectionKind::Fastp),
            "ContaminationCheck" => Some(SectionKind::ContaminationCheck),
            "AssemblyQualityStatistics" => Some(SectionKind::AssemblyQualityStatistics),
            "cgMLSTQC" => Some(SectionKind::CgMlstQc),
            "SpeciesDetermination" => Some(SectionKind::SpeciesDetermination),
            "PredictedSerotype" => Some(SectionKind::PredictedSerotype),
            "PredictedPathotype" => Some(SectionKind::PredictedPathotype),
            "AMRProfile" => Some(SectionKind::AmrProfile),
            "MLSTSequenceType" => Some(SectionKind::MlstSequenceType),
            _ => None,
        }
    }
}

/// Renders a JSON leaf as a table cell. `None` means the cell is absent.
pub fn render_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => Some(join_list(items)),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Joins list elements with `", "`; empty lists join to an empty string.
pub fn join_list(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(render_cell)
        .collect::<Vec<_>>()
        .join(", ")
}
