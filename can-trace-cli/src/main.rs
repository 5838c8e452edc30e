//! CAN Trace CLI Application
//!
//! Command-line front end of the can-trace-decoder library. It adds:
//! - TOML configuration merged with command-line flags
//! - Signal discovery by keyword
//! - Parallel analysis of several traces against one dictionary
//! - Text and JSON reports

use anyhow::{bail, Context, Result};
use can_trace_decoder::{
    ConsistencyTriple, SignalDatabase, SignalObservation, TimeSeriesAnalyzer,
    TraceAnalysis, TraceFormat, TracePipeline,
};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::{AppConfig, CliOverrides, OutputFormat, RunSettings};

/// CAN Trace - Decode CAN traces and analyze signal time series
#[derive(Parser, Debug)]
#[command(name = "can-trace")]
#[command(about = "Decode CAN traces (candump, ASC, CSV, raw hex) and analyze signals", long_about = None)]
#[command(version)]
struct Args {
    /// Trace file(s) to analyze (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    trace: Vec<PathBuf>,

    /// Path to DBC file(s) (can be repeated)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Trace format: candump_log, asc, csv, raw_hex (default: from extension)
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<TraceFormat>,

    /// First cell of the CSV header row (default: "Message Number")
    #[arg(long, value_name = "TEXT")]
    csv_header_marker: Option<String>,

    /// Fixed raw hex identifier width, 3 or 4 (default: guessed per line)
    #[arg(long, value_name = "DIGITS")]
    raw_hex_id_digits: Option<usize>,

    /// Signal to analyze (can be repeated)
    #[arg(short, long, value_name = "NAME")]
    signal: Vec<String>,

    /// Consistency check MAX,AVG,MIN
    #[arg(long, value_name = "MAX,AVG,MIN")]
    triple: Option<ConsistencyTriple>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Print every decoded observation before the report
    #[arg(long)]
    print_observations: bool,

    /// List dictionary signals whose names contain any keyword, then exit
    #[arg(long, value_name = "KEYWORD", num_args = 1..)]
    list_signals: Vec<String>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Outcome of one trace, kept in input order
struct TraceResult {
    trace: PathBuf,
    format: TraceFormat,
    analysis: TraceAnalysis,
    observations: Vec<SignalObservation>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Trace CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_trace_decoder::VERSION);

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let settings = file_config.resolve(CliOverrides {
        traces: args.trace.clone(),
        dbc: args.dbc.clone(),
        format: args.format,
        csv_header_marker: args.csv_header_marker.clone(),
        raw_hex_id_digits: args.raw_hex_id_digits,
        signals: args.signal.clone(),
        triple: args.triple.clone(),
        json: args.json,
        print_observations: args.print_observations,
    });

    if settings.dbc.is_empty() {
        bail!("No DBC file given (use --dbc or [input] dbc in the config file)");
    }
    let database = load_database(&settings.dbc)?;

    if !args.list_signals.is_empty() {
        list_signals(&database, &args.list_signals);
        return Ok(());
    }

    for name in &settings.signals {
        if database.find_signal(name).is_empty() {
            log::warn!("Signal '{}' is not defined in any loaded DBC", name);
        }
    }

    if settings.traces.is_empty() {
        bail!("No trace file given (use --trace or [input] traces in the config file)");
    }

    // One pipeline per trace, all sharing the dictionary read-only
    let results: Vec<Result<TraceResult>> = settings
        .traces
        .par_iter()
        .map(|trace| analyze_trace(&database, &settings, trace))
        .collect();

    let mut succeeded = Vec::new();
    let mut failures = 0;
    for (trace, result) in settings.traces.iter().zip(results) {
        match result {
            Ok(result) => succeeded.push(result),
            Err(e) => {
                failures += 1;
                log::error!("{:?}: {:#}", trace, e);
            }
        }
    }

    print_results(&settings, &succeeded)?;

    if failures > 0 {
        bail!("{} of {} trace(s) failed", failures, settings.traces.len());
    }

    Ok(())
}

fn load_database(paths: &[PathBuf]) -> Result<SignalDatabase> {
    let mut database = SignalDatabase::new();
    for path in paths {
        database
            .add_dbc(path)
            .with_context(|| format!("Failed to load DBC: {:?}", path))?;
    }

    let stats = database.stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );
    Ok(database)
}

fn list_signals(database: &SignalDatabase, keywords: &[String]) {
    let keywords: Vec<&str> = keywords.iter().map(String::as_str).collect();
    let matches = database.find_signals(&keywords);

    if matches.is_empty() {
        println!("No signals match {:?}", keywords);
        return;
    }

    println!("Signals matching {:?}:", keywords);
    for m in matches {
        println!("  0x{:03X}  {:<30} {}", m.can_id, m.message_name, m.signal_name);
    }
}

fn analyze_trace(
    database: &SignalDatabase,
    settings: &RunSettings,
    trace: &Path,
) -> Result<TraceResult> {
    let format = settings.format_for(trace).with_context(|| {
        format!(
            "Cannot guess the format of {:?}, set --format or [input] format",
            trace
        )
    })?;

    let pipeline = TracePipeline::new(database, settings.pipeline_config(format))?;
    let mut analyzer = TimeSeriesAnalyzer::new(settings.triple.clone());
    let mut collected = Vec::new();

    let mut observations = pipeline
        .run_file(trace)
        .with_context(|| format!("Failed to open trace: {:?}", trace))?;
    for observation in observations.by_ref() {
        let observation =
            observation.with_context(|| format!("Failed while reading trace: {:?}", trace))?;
        analyzer.observe(&observation);
        if settings.print_observations {
            collected.push(observation);
        }
    }
    let stats = *observations.stats();

    Ok(TraceResult {
        trace: trace.to_path_buf(),
        format,
        analysis: TraceAnalysis {
            report: analyzer.finish(),
            stats,
        },
        observations: collected,
    })
}

fn print_results(settings: &RunSettings, results: &[TraceResult]) -> Result<()> {
    match settings.output {
        OutputFormat::Json => {
            let reports: Vec<report::TraceReport<'_>> = results
                .iter()
                .map(|r| report::TraceReport {
                    trace: &r.trace,
                    format: r.format,
                    analysis: &r.analysis,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Text => {
            for result in results {
                if settings.print_observations {
                    println!("Observations in {:?}:", result.trace);
                    print!("{}", report::render_observations(&result.observations));
                    println!();
                }
                println!(
                    "{}",
                    report::render_text(&result.trace, result.format, &result.analysis)
                );
            }
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
