//! Command-line front end: converts schedule workbooks into category order templates.
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use rusty_schedule::Config;
use rusty_schedule::DirectorySink;
use rusty_schedule::FileTemplateSource;
use rusty_schedule::Pipeline;
use rusty_schedule::Registry;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Command-line arguments for rusty-schedule
#[derive(Parser, Debug)]
#[command(name = "rusty-schedule")]
#[command(about = "Convert media schedules into per-category order templates")]
#[command(version)]
struct Args {
    /// Schedule workbooks or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Configuration file
    #[arg(short, long, env = "RUST_SCHEDULE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory relative template locations are resolved against
    #[arg(short, long)]
    templates_dir: Option<PathBuf>,

    /// Directory output workbooks are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// 0-based header row of every template, overriding the configuration
    #[arg(long)]
    header_row: Option<usize>,

    /// Print normalized lines as JSON instead of writing workbooks
    #[arg(long)]
    dry_run: bool,
}

/// Normalized lines of one input, as printed by `--dry-run`
#[derive(Serialize)]
struct DryRun<'a> {
    input: &'a str,
    sheet: Option<String>,
    schedule: rusty_schedule::schedule::Schedule,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!(failures, "some inputs failed to convert");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Converts every input, returning how many failed.
fn run(args: &Args) -> Result<usize> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut registry: Registry = config.registry().context("Invalid configuration")?;
    if let Some(header_row) = args.header_row {
        registry = registry.with_header_row_index(header_row);
    }
    let templates_dir = args
        .templates_dir
        .clone()
        .or_else(|| config.templates_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    info!(templates_dir = %templates_dir.display(), out_dir = %args.out_dir.display(), "starting conversion");

    let pipeline = Pipeline::new(registry, FileTemplateSource::new(&templates_dir));
    let inputs = expand_inputs(&args.inputs)?;
    let mut failures = 0usize;
    for input in &inputs {
        let result = if args.dry_run {
            dry_run(&pipeline, input)
        } else {
            convert(&pipeline, input, &args.out_dir)
        };
        if let Err(e) = result {
            error!(input = %input.display(), "{:#}", e);
            failures += 1;
        }
    }
    Ok(failures)
}

/// Expands glob patterns; arguments without glob syntax are taken as paths.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(input));
            continue;
        }
        let before = paths.len();
        for entry in glob::glob(input).with_context(|| format!("Invalid pattern '{}'", input))? {
            paths.push(entry.with_context(|| format!("Failed to expand '{}'", input))?);
        }
        if paths.len() == before {
            warn!(pattern = %input, "pattern matched no files");
        }
    }
    if paths.is_empty() {
        bail!("No input files");
    }
    Ok(paths)
}

fn convert(pipeline: &Pipeline<FileTemplateSource>, input: &Path, out_dir: &Path) -> Result<()> {
    let mut sink = DirectorySink::new(out_dir);
    let report = pipeline
        .run_path(input, &mut sink)
        .with_context(|| format!("Failed to convert '{}'", input.display()))?;
    if let Some(issue) = report.issue {
        warn!(input = %input.display(), "{}", issue);
    }
    info!(
        input = %input.display(),
        lines = report.lines_extracted,
        outputs = sink.written().len(),
        "converted"
    );
    Ok(())
}

fn dry_run(pipeline: &Pipeline<FileTemplateSource>, input: &Path) -> Result<()> {
    let name = input.to_string_lossy();
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read '{}'", name))?;
    let (sheet, schedule) = pipeline
        .read(&name, bytes)
        .with_context(|| format!("Failed to read schedule '{}'", name))?;
    let output = DryRun {
        input: &name,
        sheet,
        schedule,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
