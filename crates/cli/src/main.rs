//! CLI entry point for daily order-imbalance analysis.
//!
//! Subcommands:
//!   - `plan`  : Print the retrieval windows for a date range
//!   - `fetch` : Retrieve order events from the historical API and summarize them
//!   - `csv`   : Summarize order events from a CSV file

mod csv_input;
mod output;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use imbalance_core::{Config, DailySummary};
use imbalance_ingestion::{write_daily_csv, ChunkPlanner, CsvColumns};
use imbalance_retrieval::{
    plan_range, DatabentoClient, EventProvider, Progress, RetrievalDriver, RunOutput,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use csv_input::summarize_csv;
use output::{render_table, JsonOutput};

#[derive(Parser)]
#[command(
    name = "imbalance",
    version,
    about = "Daily order-book imbalance versus price change",
    propagate_version = true
)]
struct Cli {
    /// JSON configuration file (missing fields take defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Trading calendar offset from UTC in minutes (overrides the config)
    #[arg(long, global = true, allow_negative_numbers = true)]
    utc_offset_minutes: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the retrieval windows for a date range
    Plan(PlanArgs),
    /// Retrieve events from the historical API and summarize them by day
    Fetch(FetchArgs),
    /// Summarize events from a CSV file by day
    Csv(CsvArgs),
}

#[derive(Args)]
struct RangeArgs {
    /// First date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    start: NaiveDate,

    /// Last date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    end: NaiveDate,

    /// Calendar days per retrieval window (overrides the config)
    #[arg(long)]
    chunk_days: Option<u32>,
}

#[derive(Args)]
struct OutputArgs {
    /// Print JSON instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also write the daily table as CSV to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    range: RangeArgs,
}

#[derive(Args)]
struct FetchArgs {
    /// Symbol to retrieve (e.g. "ESH4")
    #[arg(long)]
    symbol: String,

    #[command(flatten)]
    range: RangeArgs,

    /// Historical API key
    #[arg(long, env = "DATABENTO_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Dataset (overrides the config)
    #[arg(long)]
    dataset: Option<String>,

    /// Fetch the next window while the current one is aggregated
    #[arg(long, default_value_t = false)]
    prefetch: bool,

    /// Query with the symbol as given instead of resolving it first
    #[arg(long, default_value_t = false)]
    no_resolve: bool,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
struct CsvArgs {
    /// CSV file with one order event per row
    #[arg(long)]
    input: PathBuf,

    /// Timestamp column name
    #[arg(long, default_value = "ts_event")]
    ts_column: String,

    /// Side column name
    #[arg(long, default_value = "side")]
    side_column: String,

    /// Action column name
    #[arg(long, default_value = "action")]
    action_column: String,

    /// Size column name
    #[arg(long, default_value = "size")]
    size_column: String,

    /// Price column name
    #[arg(long, default_value = "price")]
    price_column: String,

    #[command(flatten)]
    out: OutputArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(minutes) = cli.utc_offset_minutes {
        config.calendar.utc_offset_minutes = minutes;
    }

    match cli.command {
        Commands::Plan(args) => cmd_plan(config, args),
        Commands::Fetch(args) => cmd_fetch(config, args),
        Commands::Csv(args) => cmd_csv(config, args),
    }
}

fn apply_range(config: &mut Config, range: &RangeArgs) -> Result<()> {
    if let Some(chunk_days) = range.chunk_days {
        config.retrieval.chunk_days = chunk_days;
    }
    config.validate().context("invalid configuration")?;
    Ok(())
}

fn cmd_plan(mut config: Config, args: PlanArgs) -> Result<()> {
    apply_range(&mut config, &args.range)?;
    let planner = ChunkPlanner::new(config.retrieval.chunk_days)?;
    let windows = plan_range(&planner, args.range.start, args.range.end)?;
    for (i, window) in windows.iter().enumerate() {
        println!("{:>4}  {}  {}  ({} day(s))", i + 1, window.start, window.end, window.days());
    }
    println!("{} window(s)", windows.len());
    Ok(())
}

fn cmd_fetch(mut config: Config, args: FetchArgs) -> Result<()> {
    apply_range(&mut config, &args.range)?;
    if let Some(dataset) = &args.dataset {
        config.retrieval.dataset = dataset.clone();
    }
    if args.no_resolve {
        config.retrieval.resolve_symbols = false;
    }

    let client = DatabentoClient::new(args.api_key.as_str(), &config.provider)?;
    let driver = RetrievalDriver::new(client.clone(), &config)?
        .with_resolver(client)
        .with_prefetch(config.retrieval.prefetch || args.prefetch);

    let output = run_driver(&driver, &args.symbol, &args.range)?;
    let summary = output.summary();
    let report = &output.report;

    if args.out.json {
        let mut json = JsonOutput::new(&summary);
        json.report = Some(report);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("symbol: {} (queried as {})", report.requested_symbol, report.symbol_used());
        print!("{}", render_table(&summary));
        if !report.is_complete() {
            println!(
                "{} of {} window(s) failed; their dates are missing",
                report.failed_windows.len(),
                report.windows_total
            );
        }
    }
    write_csv_output(args.out.output.as_deref(), &summary)
}

fn cmd_csv(config: Config, args: CsvArgs) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let columns = CsvColumns {
        ts_event: args.ts_column,
        side: args.side_column,
        action: args.action_column,
        size: args.size_column,
        price: args.price_column,
    };
    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let out = summarize_csv(file, &columns, config.calendar.calendar()?)
        .with_context(|| format!("summarizing {}", args.input.display()))?;

    if args.out.json {
        let mut json = JsonOutput::new(&out.summary);
        json.normalization = Some(&out.stats);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print!("{}", render_table(&out.summary));
    }
    write_csv_output(args.out.output.as_deref(), &out.summary)
}

/// Run the driver over the requested range. Failed windows are logged and
/// reported, never returned as an error.
fn run_driver<P: EventProvider + Sync>(
    driver: &RetrievalDriver<P>,
    symbol: &str,
    range: &RangeArgs,
) -> Result<RunOutput> {
    let output = driver
        .run(symbol, range.start, range.end, print_progress)
        .with_context(|| format!("retrieving {symbol}"))?;
    for failure in &output.report.failed_windows {
        warn!(window = %failure.window, error = %failure.error, "dates missing from results");
    }
    Ok(output)
}

fn print_progress(progress: &Progress) {
    eprintln!(
        "[{}/{}] {} {}",
        progress.completed,
        progress.total,
        progress.window,
        if progress.succeeded { "ok" } else { "FAILED" }
    );
}

fn write_csv_output(path: Option<&Path>, summary: &DailySummary) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_daily_csv(BufWriter::new(file), &summary.rows)?;
    info!(path = %path.display(), rows = summary.rows.len(), "wrote daily table");
    Ok(())
}
