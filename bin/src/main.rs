//! CLI for the bagelfactor evaluation engine.
//!
//! Reads a long-format CSV panel (one row per date and asset), evaluates one
//! factor against forward returns and prints a per-horizon summary.

use anyhow::{Context, bail};
use bagelfactor::{
    HorizonSummary, IcMethod, JobConfig, Pipeline, SingleFactorJob, diagnose_panel,
    ensure_panel_index,
    panel::{ASSET, DATE},
    sort_index,
};
use clap::{Args, Parser, Subcommand};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bagelfactor")]
#[command(about = "Single-factor evaluation: IC, quantile returns, turnover and coverage", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a factor column against forward returns
    Evaluate(EvaluateArgs),
    /// Report panel structure and data quality
    Diagnose {
        /// CSV file with one row per (date, asset)
        input: PathBuf,
        /// Column holding the date key
        #[arg(long, default_value = "date")]
        date_column: String,
        /// Column holding the asset key
        #[arg(long, default_value = "asset")]
        asset_column: String,
    },
}

#[derive(Args)]
struct EvaluateArgs {
    /// CSV file with one row per (date, asset)
    input: PathBuf,
    /// JSON job config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON list of preprocessing steps
    #[arg(long)]
    pipeline: Option<PathBuf>,
    /// Factor column
    #[arg(long)]
    factor: Option<String>,
    /// Price column used for forward returns
    #[arg(long)]
    price: Option<String>,
    /// Column holding the date key
    #[arg(long)]
    date_column: Option<String>,
    /// Column holding the asset key
    #[arg(long)]
    asset_column: Option<String>,
    /// Forward-return horizons, comma separated
    #[arg(long, value_delimiter = ',')]
    horizons: Option<Vec<usize>>,
    /// Number of quantile buckets
    #[arg(long)]
    quantiles: Option<usize>,
    /// IC method: pearson or spearman
    #[arg(long)]
    method: Option<IcMethod>,
    /// Sort rows by (date, asset) before evaluating
    #[arg(long)]
    sort: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl EvaluateArgs {
    /// Config file (or defaults) with command-line overrides applied.
    fn job_config(&self) -> anyhow::Result<JobConfig> {
        let mut config = match &self.config {
            Some(path) => JobConfig::from_path(path)?,
            None => JobConfig::default(),
        };
        if let Some(factor) = &self.factor {
            config.factor_column = factor.clone();
        }
        if let Some(price) = &self.price {
            config.price_column = price.clone();
        }
        if let Some(date_column) = &self.date_column {
            config.date_column = date_column.clone();
        }
        if let Some(asset_column) = &self.asset_column {
            config.asset_column = asset_column.clone();
        }
        if let Some(horizons) = &self.horizons {
            config.horizons = horizons.clone();
        }
        if let Some(n) = self.quantiles {
            config.n_quantiles = n;
        }
        if let Some(method) = self.method {
            config.ic_method = method;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Evaluate(args) => evaluate(&args),
        Commands::Diagnose {
            input,
            date_column,
            asset_column,
        } => diagnose(&input, &date_column, &asset_column),
    }
}

/// Console logging to stderr; `RUST_LOG` wins over `--verbose`.
fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("cannot open {}", path.display()))?
        .finish()
        .with_context(|| format!("cannot parse {}", path.display()))?;
    debug!(rows = frame.height(), columns = frame.width(), "read {}", path.display());
    Ok(frame)
}

fn evaluate(args: &EvaluateArgs) -> anyhow::Result<()> {
    let mut config = args.job_config()?;
    let pipeline = match &args.pipeline {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            Some(serde_json::from_str::<Pipeline>(&json).context("invalid pipeline")?)
        }
        None => None,
    };

    let table = read_csv(&args.input)?;
    let table = if args.sort {
        let panel = ensure_panel_index(&table, &config.date_column, &config.asset_column)?;
        config = config.with_keys(DATE, ASSET);
        sort_index(&panel)?.into_frame()
    } else {
        table
    };

    let result = SingleFactorJob::new(config).run(&table, None, pipeline.as_ref())?;
    let summaries = result.summaries()?;
    if summaries.is_empty() {
        bail!("no horizon was evaluated");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        print_summary(&result.config().factor_column, &summaries);
    }
    info!(horizons = summaries.len(), "done");
    Ok(())
}

fn diagnose(input: &Path, date_column: &str, asset_column: &str) -> anyhow::Result<()> {
    let table = read_csv(input)?;
    let panel = ensure_panel_index(&table, date_column, asset_column)?;
    println!("{}", diagnose_panel(panel.frame()));
    Ok(())
}

fn format_option(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn print_summary(factor: &str, summaries: &[HorizonSummary]) {
    println!("Factor: {factor}\n");
    println!(
        "{:>7}  {:>8}  {:>8}  {:>8}  {:>8}  {:>10}  {:>8}",
        "horizon", "ic_mean", "ic_std", "icir", "hit", "long_short", "turnover"
    );
    for s in summaries {
        println!(
            "{:>7}  {:>8}  {:>8}  {:>8}  {:>8}  {:>10}  {:>8}",
            s.horizon,
            format_option(s.ic_mean),
            format_option(s.ic_std),
            format_option(s.icir),
            format_option(s.ic_hit_rate),
            format_option(s.long_short_mean),
            format_option(s.turnover_mean),
        );
    }
}
