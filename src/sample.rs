use std::path::Path;

use serde_json::Value;

use crate::document::{self, RawDocument};
use crate::domain::{ANALYSIS_ID, AnalysisId, QC_VOTE, QUALITY_CHECK_SECTIONS, SENTINEL};
use crate::error::KiraError;
use crate::flatten::{self, FlatRecord};
use crate::profile::GeneProfiles;

/// Everything extracted from one sample's result document.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub analysis_id: AnalysisId,
    pub summary: FlatRecord,
    pub profiles: GeneProfiles,
}

/// Accumulates the summary row and gene profiles of a single sample.
#[derive(Debug, Clone)]
pub struct SampleParser {
    analysis_id: AnalysisId,
    summary: FlatRecord,
    profiles: GeneProfiles,
}

impl SampleParser {
    pub fn new(analysis_id: AnalysisId) -> Self {
        let mut summary = FlatRecord::new();
        summary.insert(
            ANALYSIS_ID.to_string(),
            Value::String(analysis_id.as_str().to_string()),
        );
        Self {
            analysis_id,
            summary,
            profiles: GeneProfiles::default(),
        }
    }

    /// Records the QC verdict right after the sample id.
    pub fn with_qc_vote(mut self, vote: impl Into<String>) -> Self {
        self.summary
            .insert(QC_VOTE.to_string(), Value::String(vote.into()));
        self
    }

    /// Loads `<dir>/_parseresults.json` and parses it.
    pub fn parse_directory(self, dir: &Path) -> Result<SampleRecord, KiraError> {
        let doc = document::load_result_document(&dir.join(document::RESULT_DOCUMENT))?;
        if doc.is_empty() {
            tracing::info!(sample = %self.analysis_id, "no results found");
        }
        Ok(self.parse_document(doc))
    }

    pub fn parse_document(self, mut doc: RawDocument) -> SampleRecord {
        let Self {
            analysis_id,
            mut summary,
            mut profiles,
        } = self;

        if doc.is_empty() {
            for section in QUALITY_CHECK_SECTIONS {
                summary.insert(section.to_string(), Value::String(SENTINEL.to_string()));
            }
        } else {
            for section in QUALITY_CHECK_SECTIONS {
                match doc.shift_remove(section) {
                    Some(Value::Object(category)) => {
                        summary = flatten::flatten_sections(summary, category, &mut profiles);
                    }
                    Some(other) => {
                        summary.insert(section.to_string(), other);
                    }
                    None => {
                        tracing::debug!(sample = %analysis_id, section, "category missing from document");
                    }
                }
            }
        }

        summary.insert(
            ANALYSIS_ID.to_string(),
            Value::String(analysis_id.as_str().to_string()),
        );

        SampleRecord {
            analysis_id,
            summary,
            profiles,
        }
    }
}
