//! Standalone CAN trace decoder tool
//!
//! Decodes a textual trace with a DBC file and prints every observation of the
//! requested signals, followed by the run counters.
//!
//! Usage:
//!   decode_trace <trace> --dbc <file.dbc> [--format <fmt>] [--signal <name>]... [--limit <count>]
//!
//! Example:
//!   decode_trace drive.log --dbc bms.dbc --signal SOCave292 --limit 100

use can_trace_decoder::{
    PipelineConfig, PipelineStats, SignalDatabase, SignalObservation, TraceFormat, TracePipeline,
};
use std::env;
use std::path::PathBuf;

fn print_observation(observation: &SignalObservation) {
    let clock = can_trace_decoder::types::wall_clock(observation.timestamp)
        .filter(|ts| ts.timestamp() > 946_684_800)
        .map(|ts| format!(" ({})", ts.format("%Y-%m-%d %H:%M:%S%.3f")))
        .unwrap_or_default();

    println!("[{:.6}s]{}", observation.timestamp, clock);
    for (name, value) in &observation.signals {
        println!("    {}: {:.2}", name, value);
    }
}

fn print_summary(stats: &PipelineStats) {
    println!("\n=== DECODING SUMMARY ===");
    println!("Lines read: {}", stats.lines_read);
    println!("Skipped lines: {}", stats.skipped_lines);
    println!("Malformed lines: {}", stats.malformed_lines);
    println!("Frames accepted: {}", stats.frames_accepted);
    println!("Unknown identifiers: {}", stats.unknown_identifiers);
    println!("Decode failures: {}", stats.decode_failures);
    println!("Frames without wanted signals: {}", stats.filtered_out);
    println!("Observations: {}", stats.observations);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <trace> --dbc <file.dbc> [--format candump_log|asc|csv|raw_hex] [--signal <name>]... [--limit <count>]",
            args[0]
        );
        eprintln!("\nExample:");
        eprintln!("  {} drive.log --dbc bms.dbc --signal SOCave292 --limit 100", args[0]);
        std::process::exit(1);
    }

    let trace_file = PathBuf::from(&args[1]);
    let mut dbc_files = Vec::new();
    let mut format = TraceFormat::from_extension(&trace_file);
    let mut signals = Vec::new();
    let mut limit: Option<usize> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--dbc" => {
                i += 1;
                if i < args.len() {
                    dbc_files.push(PathBuf::from(&args[i]));
                }
            }
            "--format" => {
                i += 1;
                if i < args.len() {
                    format = Some(args[i].parse()?);
                }
            }
            "--signal" => {
                i += 1;
                if i < args.len() {
                    signals.push(args[i].clone());
                }
            }
            "--limit" => {
                i += 1;
                if i < args.len() {
                    limit = Some(args[i].parse()?);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    let Some(format) = format else {
        eprintln!("Cannot guess the trace format of {:?}, pass --format", trace_file);
        std::process::exit(1);
    };

    let mut database = SignalDatabase::new();
    for dbc_file in &dbc_files {
        println!("Loading DBC: {:?}", dbc_file);
        database.add_dbc(dbc_file)?;
    }

    let db_stats = database.stats();
    println!("\n=== SIGNAL DATABASE ===");
    println!("Messages: {}", db_stats.num_messages);
    println!("Signals: {}", db_stats.num_signals);

    // Without an explicit selection, watch every signal the DBC defines
    if signals.is_empty() {
        for can_id in database.get_all_can_ids() {
            if let Some(message) = database.get_message(can_id) {
                signals.extend(message.signals.iter().map(|s| s.name.clone()));
            }
        }
    }

    let config = PipelineConfig::new(format).with_signals(signals);
    let pipeline = TracePipeline::new(&database, config)?;

    println!("\n=== DECODING {} TRACE ===\n", format);
    let mut observations = pipeline.run_file(&trace_file)?;
    let mut shown = 0;
    for observation in observations.by_ref() {
        let observation = observation?;
        if let Some(max) = limit {
            if shown >= max {
                println!("\n... (limit of {} observations reached)", max);
                break;
            }
        }
        print_observation(&observation);
        shown += 1;
    }

    print_summary(observations.stats());

    Ok(())
}
