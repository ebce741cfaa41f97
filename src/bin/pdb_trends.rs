use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pdb_trends::app::{App, ProgressSink};
use pdb_trends::cache::{CsvCache, MemoCache};
use pdb_trends::config::{ConfigLoader, ResolvedConfig};
use pdb_trends::dataset::Dataset;
use pdb_trends::domain::{Technique, YearRange};
use pdb_trends::error::TrendsError;
use pdb_trends::output::{JsonOutput, OutputMode, TextOutput};
use pdb_trends::pdbe::PdbeHttpClient;
use pdb_trends::rcsb::RcsbHttpClient;
use pdb_trends::store::Store;
use pdb_trends::view::{DashboardView, Selection, SelectionDefaults};

#[derive(Parser)]
#[command(name = "pdb-trends")]
#[command(about = "Yearly counts of released PDB structures by experimental technique")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show yearly counts and changes for a year range")]
    Show(ShowArgs),
    #[command(about = "Fill the local cache with the (technique, year) pairs it lacks")]
    Refresh(CacheArgs),
    #[command(about = "List recognized experimental techniques")]
    Techniques,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    /// Faceted RCSB search, one request per technique.
    Live,
    /// Local CSV cache, gap-filled from PDBe.
    Cache,
}

#[derive(Args)]
struct ShowArgs {
    #[arg(long, value_enum, default_value_t = Source::Live)]
    source: Source,

    #[arg(long)]
    from: Option<i32>,

    #[arg(long)]
    to: Option<i32>,

    #[arg(long = "technique", value_enum)]
    techniques: Vec<Technique>,

    #[command(flatten)]
    cache: CacheArgs,
}

#[derive(Args)]
struct CacheArgs {
    #[arg(long)]
    cache_file: Option<String>,

    #[arg(long)]
    min_year: Option<i32>,

    #[arg(long)]
    max_year: Option<i32>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<TrendsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TrendsError) -> u8 {
    match error {
        TrendsError::EmptyResult => 2,
        error if error.is_remote() => 3,
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
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Show(args) => run_show(args, &config, output_mode, sink),
        Commands::Refresh(args) => run_refresh(args, &config, output_mode, sink),
        Commands::Techniques => match output_mode {
            OutputMode::Json => JsonOutput::print_techniques().into_diagnostic(),
            OutputMode::Text => TextOutput::print_techniques().into_diagnostic(),
        },
    }
}

fn build_app(
    config: &ResolvedConfig,
) -> Result<App<RcsbHttpClient, PdbeHttpClient>, TrendsError> {
    let rcsb = RcsbHttpClient::new(&config.http)?;
    let pdbe = PdbeHttpClient::new(&config.http)?;
    Ok(App::new(rcsb, pdbe))
}

fn resolve_cache(
    args: &CacheArgs,
    config: &ResolvedConfig,
) -> Result<(CsvCache, YearRange), TrendsError> {
    let path = match args.cache_file.as_deref().map(Utf8PathBuf::from) {
        Some(path) => path,
        None => match &config.cache_file {
            Some(path) => path.clone(),
            None => Store::new()?.cache_file_path(),
        },
    };
    let years = YearRange::new(
        args.min_year.unwrap_or(config.years.low()),
        args.max_year.unwrap_or(config.years.high()),
    )?;
    Ok((CsvCache::new(path), years))
}

fn run_show(
    args: ShowArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    sink: &dyn ProgressSink,
) -> miette::Result<()> {
    let app = build_app(config)?;
    let dataset: Dataset = match args.source {
        Source::Live => {
            let memo = MemoCache::new();
            let dataset = app.load_live(&memo, &config.techniques, sink)?;
            Dataset::clone(&dataset)
        }
        Source::Cache => {
            let (cache, years) = resolve_cache(&args.cache, config)?;
            app.refresh_incremental(&cache, &config.techniques, years, sink)?
                .dataset
        }
    };

    let defaults = SelectionDefaults {
        from_year: config.default_from_year,
        techniques: config.default_techniques.clone(),
    };
    let selection = Selection::resolve(&dataset, args.from, args.to, &args.techniques, &defaults)?;
    let view = DashboardView::build(&dataset, selection);

    match output_mode {
        OutputMode::Json => JsonOutput::print_view(&view).into_diagnostic(),
        OutputMode::Text => TextOutput::print_view(&view).into_diagnostic(),
    }
}

fn run_refresh(
    args: CacheArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    sink: &dyn ProgressSink,
) -> miette::Result<()> {
    let app = build_app(config)?;
    let (cache, years) = resolve_cache(&args, config)?;
    let result = app.refresh_incremental(&cache, &config.techniques, years, sink)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_refresh(&result).into_diagnostic(),
        OutputMode::Text => TextOutput::print_refresh(&result).into_diagnostic(),
    }
}
