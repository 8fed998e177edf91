use serde_json::{Map, Value};

use crate::archive::Archive;
use crate::dataset::{Dataset, Row};
use crate::domain::{ANALYSIS_ID, QC_VOTE, SENTINEL, SEQUENCE_TYPE, join_list, render_cell};
use crate::error::KiraError;
use crate::sample::SampleRecord;

const AMR_GENES: &str = "genes";
const AMR_GENE: &str = "Gene";
const AMR_PHENOTYPES: &str = "phenotypes";

/// Turns per-sample records into the four batch tables.
pub struct DatasetBuilder;

impl DatasetBuilder {
    pub fn build(records: &[SampleRecord]) -> Result<Archive, KiraError> {
        let mut summary = Self::summary(records);
        let mut pathotypes = Self::pathotypes(records);
        let mut amr = Self::amr(records);
        let mut mlst = Self::mlst(records, summary.has_column(SEQUENCE_TYPE));

        summary.move_column(ANALYSIS_ID, 0);
        summary.move_column(QC_VOTE, 1);
        pathotypes.move_column(ANALYSIS_ID, 0);
        amr.move_column(ANALYSIS_ID, 0);
        mlst.move_column(ANALYSIS_ID, 0);
        mlst.move_column(SEQUENCE_TYPE, 1);

        let mut archive = Archive {
            summary,
            pathotypes,
            amr,
            mlst,
        };
        archive.normalize();
        archive.ensure_unique_samples()?;
        Ok(archive)
    }

    /// One row per sample; list values are joined into a single cell.
    pub fn summary(records: &[SampleRecord]) -> Dataset {
        Dataset::from_rows(records.iter().map(|record| {
            record
                .summary
                .iter()
                .filter_map(|(key, value)| render_cell(value).map(|cell| (key.clone(), cell)))
                .collect::<Row>()
        }))
    }

    /// One row per pathotype gene call.
    pub fn pathotypes(records: &[SampleRecord]) -> Dataset {
        let mut dataset = Dataset::new();
        for record in records {
            let Some(genes) = &record.profiles.pathotype else {
                continue;
            };
            for gene in genes {
                let mut row = id_row(record);
                append_cells(&mut row, gene);
                dataset.push_row(row);
            }
        }
        dataset
    }

    /// One row per resistance variant, with a single `Gene` and joined phenotypes.
    pub fn amr(records: &[SampleRecord]) -> Dataset {
        let mut dataset = Dataset::new();
        for record in records {
            let Some(variations) = &record.profiles.amr else {
                continue;
            };
            for variation in variations {
                for (variant, details) in variation {
                    let Value::Object(details) = details else {
                        tracing::warn!(sample = %record.analysis_id, %variant, "AMR entry is not a record; skipped");
                        continue;
                    };
                    dataset.push_row(amr_row(record, details));
                }
            }
        }
        dataset
    }

    /// One row per sample allele map, carrying the sample's ST when the summary has one.
    pub fn mlst(records: &[SampleRecord], with_sequence_type: bool) -> Dataset {
        let mut dataset = Dataset::new();
        for record in records {
            let Some(alleles) = &record.profiles.mlst else {
                continue;
            };
            let mut row = id_row(record);
            if with_sequence_type {
                let sequence_type = record
                    .summary
                    .get(SEQUENCE_TYPE)
                    .and_then(render_cell)
                    .unwrap_or_else(|| SENTINEL.to_string());
                row.insert(SEQUENCE_TYPE.to_string(), sequence_type);
            }
            append_cells(&mut row, alleles);
            dataset.push_row(row);
        }
        dataset
    }
}

fn id_row(record: &SampleRecord) -> Row {
    let mut row = Row::new();
    row.insert(ANALYSIS_ID.to_string(), record.analysis_id.to_string());
    row
}

fn append_cells(row: &mut Row, record: &Map<String, Value>) {
    for (key, value) in record {
        if key == ANALYSIS_ID {
            continue;
        }
        if let Some(cell) = render_cell(value) {
            row.insert(key.clone(), cell);
        }
    }
}

fn amr_row(record: &SampleRecord, details: &Map<String, Value>) -> Row {
    let mut row = id_row(record);
    for (key, value) in details {
        match key.as_str() {
            ANALYSIS_ID | AMR_GENES => {}
            AMR_PHENOTYPES => {
                let phenotypes = match value {
                    Value::Array(items) => join_list(items),
                    other => render_cell(other).unwrap_or_default(),
                };
                let phenotypes = if phenotypes.is_empty() {
                    SENTINEL.to_string()
                } else {
                    phenotypes
                };
                row.insert(AMR_PHENOTYPES.to_string(), phenotypes);
            }
            _ => {
                if let Some(cell) = render_cell(value) {
                    row.insert(key.clone(), cell);
                }
            }
        }
    }
    // Variants are displayed as single-gene entries.
    let gene = match details.get(AMR_GENES) {
        Some(Value::Array(genes)) => genes.first().and_then(render_cell),
        Some(other) => render_cell(other),
        None => None,
    };
    if let Some(gene) = gene {
        row.insert(AMR_GENE.to_string(), gene);
    }
    row
}
