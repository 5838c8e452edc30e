//! Report rendering
//!
//! Text output for people and JSON output for scripts. Both render the
//! analysis of one trace at a time, in the order the traces were given.

use can_trace_decoder::types::wall_clock;
use can_trace_decoder::{SignalObservation, TraceAnalysis, TraceFormat};
use serde::Serialize;
use std::fmt::{self, Write};
use std::path::Path;

/// Timestamps in this range (2000-01-01 .. 2100-01-01) are shown as UTC too
const PLAUSIBLE_EPOCH: std::ops::Range<f64> = 946_684_800.0..4_102_444_800.0;

/// JSON record of one analyzed trace
#[derive(Debug, Serialize)]
pub struct TraceReport<'a> {
    pub trace: &'a Path,
    pub format: TraceFormat,
    #[serde(flatten)]
    pub analysis: &'a TraceAnalysis,
}

fn format_timestamp(seconds: f64) -> String {
    if !PLAUSIBLE_EPOCH.contains(&seconds) {
        return format!("{:.3}s", seconds);
    }
    match wall_clock(seconds) {
        Some(ts) => format!("{:.3}s ({})", seconds, ts.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        None => format!("{:.3}s", seconds),
    }
}

/// Render the text report of one trace
pub fn render_text(trace: &Path, format: TraceFormat, analysis: &TraceAnalysis) -> String {
    let mut out = String::new();
    // fmt::Write for String is infallible
    let _ = write_report(&mut out, trace, format, analysis);
    out
}

/// Write the text report of one trace into any formatter sink
pub fn write_report(
    out: &mut impl Write,
    trace: &Path,
    format: TraceFormat,
    analysis: &TraceAnalysis,
) -> fmt::Result {
    let report = &analysis.report;
    let stats = &analysis.stats;

    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  {} ({})", trace.display(), format)?;
    writeln!(out, "═══════════════════════════════════════════════")?;

    if report.is_empty() {
        writeln!(out, "No observations of the requested signals")?;
        return writeln!(
            out,
            "Lines read: {}, malformed: {}, frames: {}",
            stats.lines_read, stats.malformed_lines, stats.frames_accepted
        );
    }

    writeln!(
        out,
        "Time span: {:.3}s ({:.2} min)",
        report.time_span,
        report.time_span / 60.0
    )?;
    if let (Some(start), Some(end)) = (report.start_time, report.end_time) {
        writeln!(out, "Start: {}", format_timestamp(start))?;
        writeln!(out, "End:   {}", format_timestamp(end))?;
    }
    writeln!(out, "Observations: {}", report.observation_count)?;
    writeln!(
        out,
        "Lines read: {}, malformed: {}, unknown IDs: {}, decode failures: {}",
        stats.lines_read, stats.malformed_lines, stats.unknown_identifiers, stats.decode_failures
    )?;

    writeln!(out, "\nSignals:")?;
    let width = report.per_signal.keys().map(|k| k.len()).max().unwrap_or(0);
    for (name, summary) in &report.per_signal {
        writeln!(
            out,
            "  {:<width$}  first {:>10.3}  last {:>10.3}  delta {:>+10.3}  rate {:>12}  ({} samples)",
            name,
            summary.first,
            summary.last,
            summary.delta,
            summary.rate_per_hour.to_string(),
            summary.samples,
            width = width
        )?;
    }

    if let Some(triple) = &report.consistency_triple {
        writeln!(
            out,
            "\nConsistency {} >= {} >= {}:",
            triple.max, triple.avg, triple.min
        )?;
        if report.consistency_violations.is_empty() {
            writeln!(out, "  ✓ no violations")?;
        } else {
            writeln!(
                out,
                "  ✗ {} violation(s)",
                report.consistency_violations.len()
            )?;
            for violation in &report.consistency_violations {
                writeln!(out, "    {}", violation)?;
            }
        }
    }

    Ok(())
}

/// Render decoded observations, one per line
pub fn render_observations(observations: &[SignalObservation]) -> String {
    let mut out = String::new();
    let _ = write_observations(&mut out, observations);
    out
}

/// Write decoded observations, one per line
pub fn write_observations(out: &mut impl Write, observations: &[SignalObservation]) -> fmt::Result {
    for observation in observations {
        writeln!(out, "  {}", observation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_trace_decoder::{
        ConsistencyTriple, PipelineStats, SignalMap, TimeSeriesAnalyzer,
    };

    fn obs(timestamp: f64, values: &[(&str, f64)]) -> SignalObservation {
        let signals: SignalMap = values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        SignalObservation { timestamp, signals }
    }

    fn analysis(observations: &[SignalObservation]) -> TraceAnalysis {
        let triple = ConsistencyTriple::new("SOCmax292", "SOCave292", "SOCmin292");
        TraceAnalysis {
            report: TimeSeriesAnalyzer::new(Some(triple)).summarize(observations),
            stats: PipelineStats {
                observations: observations.len(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_text_report_sections() {
        let analysis = analysis(&[
            obs(1_547_900_000.0, &[("SOCmax292", 60.0), ("SOCave292", 55.0), ("SOCmin292", 50.0)]),
            obs(1_547_903_600.0, &[("SOCmax292", 54.0), ("SOCave292", 56.0), ("SOCmin292", 52.0)]),
        ]);
        let text = render_text(Path::new("drive.log"), TraceFormat::CandumpLog, &analysis);

        assert!(text.contains("drive.log (candump_log)"));
        assert!(text.contains("Time span: 3600.000s (60.00 min)"));
        assert!(text.contains("2019-01-19"));
        assert!(text.contains("+2.000/h"));
        assert!(text.contains("1 violation(s)"));
    }

    #[test]
    fn test_line_number_timestamps_not_dated() {
        let analysis = analysis(&[obs(3.0, &[("SOCave292", 55.0)])]);
        let text = render_text(Path::new("dump.txt"), TraceFormat::RawHex, &analysis);
        assert!(text.contains("Start: 3.000s\n"));
        assert!(text.contains("undefined"));
    }

    #[test]
    fn test_empty_report() {
        let analysis = analysis(&[]);
        let text = render_text(Path::new("empty.asc"), TraceFormat::Asc, &analysis);
        assert!(text.contains("No observations"));
    }

    /// Sink that refuses every write after the first `budget` bytes
    struct Truncated {
        written: String,
        budget: usize,
    }

    impl Write for Truncated {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            if self.written.len() + s.len() > self.budget {
                return Err(fmt::Error);
            }
            self.written.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn test_write_error_stops_report() {
        let analysis = analysis(&[
            obs(1.0, &[("SOCmax292", 60.0), ("SOCave292", 55.0), ("SOCmin292", 50.0)]),
            obs(2.0, &[("SOCmax292", 61.0), ("SOCave292", 56.0), ("SOCmin292", 51.0)]),
        ]);
        let mut sink = Truncated {
            written: String::new(),
            budget: 200,
        };
        let result = write_report(&mut sink, Path::new("drive.log"), TraceFormat::CandumpLog, &analysis);
        assert!(result.is_err());
        assert!(sink.written.contains("drive.log"));
        assert!(!sink.written.contains("Consistency"));

        let mut full = String::new();
        write_report(&mut full, Path::new("drive.log"), TraceFormat::CandumpLog, &analysis).unwrap();
        assert_eq!(full, render_text(Path::new("drive.log"), TraceFormat::CandumpLog, &analysis));
        assert!(full.contains("no violations"));
    }

    #[test]
    fn test_observation_lines() {
        let observations = [obs(1.0, &[("SOCave292", 55.0)]), obs(2.0, &[("SOCave292", 56.0)])];
        assert_eq!(render_observations(&observations).lines().count(), 2);
    }

    #[test]
    fn test_json_report() {
        let analysis = analysis(&[obs(1.0, &[("SOCave292", 55.0)])]);
        let report = TraceReport {
            trace: Path::new("drive.log"),
            format: TraceFormat::CandumpLog,
            analysis: &analysis,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["trace"], "drive.log");
        assert_eq!(value["format"], "candump_log");
        assert_eq!(value["report"]["observation_count"], 1);
        assert_eq!(
            value["report"]["per_signal"]["SOCave292"]["rate_per_hour"]["state"],
            "undefined"
        );
        assert_eq!(value["stats"]["observations"], 1);
    }
}
