use std::io::{self, Write};

use serde::Serialize;

use crate::app::{InspectResult, ProgressEvent, ProgressSink, RunResult};
use crate::archive::MergeOutcome;
use crate::domain::QC_PASS;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_inspect(result: &InspectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Progress lines on stderr and a coloured summary on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_run(result: &RunResult) {
        let failed = result
            .samples
            .iter()
            .filter(|sample| sample.qc_vote != QC_PASS)
            .count();

        println!("{CYAN}KIRA-WGS summary: {}{RESET}", result.run_name);
        println!(
            "{GREEN}samples: {} ({} passed){RESET}",
            result.samples.len(),
            result.samples.len() - failed
        );
        if failed > 0 {
            println!("{YELLOW}failed QC: {failed}{RESET}");
        }
        for sample in &result.samples {
            let color = if sample.qc_vote == QC_PASS { GREEN } else { RED };
            println!("{color}  {} {}{RESET}", sample.sample, sample.qc_vote);
        }

        let outcome = match &result.outcome {
            MergeOutcome::Fresh => "new archive".to_string(),
            MergeOutcome::Merged { previous_samples } => {
                format!("merged onto {previous_samples} archived samples")
            }
            MergeOutcome::Replaced { missing } => format!(
                "previous archive replaced (missing {})",
                missing
                    .iter()
                    .map(|name| name.sheet_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        println!("{CYAN}archive: {} ({outcome}){RESET}", result.archive.artifact);
        println!(
            "  Summary {} | Pathotypes {} | AMR {} | MLST {}",
            result.counts.summary, result.counts.pathotypes, result.counts.amr, result.counts.mlst
        );
        if let Some(alleles) = &result.alleles {
            println!("{CYAN}alleles: {} ({} samples){RESET}", alleles.path, alleles.samples);
        }
    }

    pub fn print_inspect(result: &InspectResult) {
        if !result.probe.exists {
            println!("{YELLOW}{}: no archive{RESET}", result.path);
            return;
        }
        println!("{CYAN}{}{RESET}", result.path);
        for name in &result.probe.tables {
            println!("{GREEN}  {}{RESET}", name.sheet_name());
        }
        for name in result.probe.missing() {
            println!("{RED}  {} (missing){RESET}", name.sheet_name());
        }
        if let Some(counts) = result.counts {
            println!(
                "  rows: Summary {} | Pathotypes {} | AMR {} | MLST {}",
                counts.summary, counts.pathotypes, counts.amr, counts.mlst
            );
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
