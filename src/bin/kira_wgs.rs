use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_wgs_surveillance::app::{App, MergeRequest, RunRequest};
use kira_wgs_surveillance::config::{ConfigLoader, ConfigOverrides};
use kira_wgs_surveillance::domain::{AnalysisId, Species};
use kira_wgs_surveillance::error::KiraError;
use kira_wgs_surveillance::input::InputSource;
use kira_wgs_surveillance::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_wgs_surveillance::pipeline::{NextflowRunner, PipelineOutcome, PipelineRunner};
use kira_wgs_surveillance::store::Store;

#[derive(Parser)]
#[command(name = "kira-wgs")]
#[command(about = "Batch runner and cumulative report builder for EFSA WGS OneHealth results")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the pipeline on a batch of samples and update the archive")]
    Run(RunArgs),
    #[command(about = "Build tables from existing result documents and merge them into an archive")]
    Merge(MergeArgs),
    #[command(about = "Show which tables an archive holds")]
    Inspect(InspectArgs),
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long, default_value = ".")]
    output: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    run_name: Option<String>,

    #[arg(long)]
    species: Option<Species>,

    #[arg(long)]
    workflow: Option<PathBuf>,

    #[arg(long)]
    nextflow_config: Option<PathBuf>,

    #[arg(long)]
    previous_run: Option<Utf8PathBuf>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Directory of FASTQ files named `<sample>_...`
    #[arg(long)]
    fastq: Option<Utf8PathBuf>,

    /// Headerless TSV of `sample<TAB>fq1<TAB>fq2`
    #[arg(long)]
    samples: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    #[arg(long)]
    archive: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Utf8PathBuf,

    #[arg(required = true)]
    documents: Vec<Utf8PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    archive: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    if error.is_integrity() {
        return 4;
    }
    match error {
        KiraError::MissingConfig(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::MissingOption(_)
        | KiraError::InvalidSpecies(_)
        | KiraError::InvalidSampleId(_)
        | KiraError::InvalidInput(_)
        | KiraError::RunExists(_)
        | KiraError::NoSamples => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Run(args) => run_batch(args, output_mode),
        Commands::Merge(args) => run_merge(args, output_mode),
        Commands::Inspect(args) => run_inspect(args, output_mode),
    }
}

fn run_batch(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let RunArgs {
        input,
        output,
        config,
        run_name,
        species,
        workflow,
        nextflow_config,
        previous_run,
    } = args;

    let resolved = ConfigLoader::resolve(config.as_deref())?.apply(ConfigOverrides {
        workflow,
        nextflow_config,
        species,
        run_name,
    });
    let settings = resolved.pipeline_settings()?;
    let input = match (input.fastq, input.samples) {
        (Some(dir), None) => InputSource::FastqDir(dir),
        (None, Some(sheet)) => InputSource::SampleSheet(sheet),
        _ => {
            return Err(KiraError::InvalidInput(
                "pass exactly one of --fastq or --samples".to_string(),
            )
            .into());
        }
    };

    let app = App::new(Store::new(output), NextflowRunner::new(settings));
    let request = RunRequest {
        run_name: resolved.run_name,
        input,
        previous_run,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.run(request, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.run(request, &ConsoleOutput)?;
            ConsoleOutput::print_run(&result);
        }
    }
    Ok(())
}

fn run_merge(args: MergeArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(Store::new(args.output.clone()), NopPipeline);
    let request = MergeRequest {
        archive: args.archive,
        output: args.output,
        documents: args.documents,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.merge(request, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.merge(request, &ConsoleOutput)?;
            ConsoleOutput::print_run(&result);
        }
    }
    Ok(())
}

fn run_inspect(args: InspectArgs, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(Store::new(Utf8PathBuf::from(".")), NopPipeline);

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.inspect(&args.archive, &JsonOutput)?;
            JsonOutput::print_inspect(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.inspect(&args.archive, &ConsoleOutput)?;
            ConsoleOutput::print_inspect(&result);
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct NopPipeline;

impl PipelineRunner for NopPipeline {
    fn run(
        &self,
        _sample: &AnalysisId,
        _sample_dir: &std::path::Path,
    ) -> Result<PipelineOutcome, KiraError> {
        Err(KiraError::PipelineLaunch(
            "pipeline not configured".to_string(),
        ))
    }
}
