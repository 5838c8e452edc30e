//! CAN Trace Decoder Library
//!
//! Reads textual CAN bus traces (candump logs, Vector ASC, CSV exports and raw
//! hex dumps), decodes the frames through a signal dictionary and analyzes the
//! resulting time series of signal observations.
//!
//! # Architecture
//!
//! - Format adapters turn one raw line into a frame, a skip or a malformed
//!   outcome. Bad lines never abort a run.
//! - The signal dictionary is a trait boundary. [`SignalDatabase`] loads DBC
//!   files; any other implementation can be injected.
//! - The pipeline lazily chains adapter and dictionary and counts what it
//!   discards.
//! - The analyzer summarizes first/last values, rates per hour and max/avg/min
//!   consistency.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_trace_decoder::{PipelineConfig, SignalDatabase, TraceFormat, TracePipeline};
//! use std::path::Path;
//!
//! let database = SignalDatabase::load(Path::new("bms.dbc")).unwrap();
//! let config = PipelineConfig::new(TraceFormat::CandumpLog)
//!     .with_signals(["SOCmin292", "SOCave292", "SOCmax292"]);
//!
//! let pipeline = TracePipeline::new(&database, config).unwrap();
//! for observation in pipeline.run_file(Path::new("drive.log")).unwrap() {
//!     match observation {
//!         Ok(observation) => println!("{}", observation),
//!         Err(e) => eprintln!("Trace error: {}", e),
//!     }
//! }
//!
//! let analysis = pipeline.analyze_file(Path::new("drive.log")).unwrap();
//! println!("{} observations", analysis.report.observation_count);
//! ```

// Public modules
pub mod analysis;
pub mod config;
pub mod decoder;
pub mod formats;
pub mod pipeline;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use analysis::{AnalysisReport, ConsistencyViolation, Rate, SignalSummary, TimeSeriesAnalyzer};
pub use config::{ConsistencyTriple, PipelineConfig, TraceFormat};
pub use decoder::{classify_frame, decode_observation, FrameOutcome};
pub use formats::{open_trace, LineParser, TraceLines};
pub use pipeline::{ObservationIter, PipelineStats, TraceAnalysis, TracePipeline, TraceRun};
pub use signals::{DatabaseStats, DecodeError, MessageDescriptor, SignalDatabase, SignalDictionary};
pub use types::{
    CanFrame, DecoderError, LineOutcome, Result, SignalMap, SignalObservation,
};

// Internal modules (not exposed in public API)
mod message_decoder;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty database knows nothing and a pipeline over it
        // yields nothing
        let database = SignalDatabase::new();
        assert_eq!(database.stats().num_messages, 0);

        let config = PipelineConfig::new(TraceFormat::CandumpLog).add_signal("SOCave292");
        let pipeline = TracePipeline::new(&database, config).unwrap();
        let run = pipeline
            .run_lines(["(1.0) can0 292#0A1E2864000000FF"])
            .finish()
            .unwrap();
        assert!(run.observations.is_empty());
        assert_eq!(run.stats.unknown_identifiers, 1);
    }
}
