//! Trace pipeline
//!
//! Drives a format adapter and the signal decoder adapter over one trace
//! source. The pipeline is lazy: [`TracePipeline::run`] returns an iterator
//! that reads a line only when the next observation is requested, so callers
//! can stop early. Line- and frame-level problems are counted in
//! [`PipelineStats`] and never end the run; only a failing line source does.

use crate::analysis::{AnalysisReport, TimeSeriesAnalyzer};
use crate::config::PipelineConfig;
use crate::decoder::{classify_frame, FrameOutcome};
use crate::formats::{open_trace, LineParser, TraceLines};
use crate::signals::SignalDictionary;
use crate::types::{LineOutcome, Result, SignalObservation};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Counters for one pipeline run
///
/// Every line read ends up in exactly one of `skipped_lines`,
/// `malformed_lines` or `frames_accepted`; every accepted frame in exactly
/// one of `unknown_identifiers`, `decode_failures`, `filtered_out` or
/// `observations`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub lines_read: usize,
    pub skipped_lines: usize,
    pub malformed_lines: usize,
    pub frames_accepted: usize,
    pub unknown_identifiers: usize,
    pub decode_failures: usize,
    pub filtered_out: usize,
    pub observations: usize,
}

/// Observations collected from a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRun {
    pub observations: Vec<SignalObservation>,
    pub stats: PipelineStats,
}

/// Report and counters of an analyzed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceAnalysis {
    pub report: AnalysisReport,
    pub stats: PipelineStats,
}

/// Pipeline over one dictionary and configuration
///
/// The dictionary is injected and only ever read, so one pipeline (or many
/// pipelines borrowing the same dictionary) can process independent traces
/// concurrently.
pub struct TracePipeline<D> {
    dictionary: D,
    config: PipelineConfig,
}

impl<D: SignalDictionary> TracePipeline<D> {
    /// Create a pipeline, rejecting configurations that can't match anything
    pub fn new(dictionary: D, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { dictionary, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Lazily decode observations from a line source
    pub fn run<I>(&self, lines: I) -> ObservationIter<'_, D, I::IntoIter>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        log::info!(
            "Starting {} run for {} signal(s)",
            self.config.format,
            self.config.signal_names.len()
        );

        ObservationIter {
            lines: lines.into_iter(),
            parser: LineParser::new(&self.config),
            pipeline: self,
            stats: PipelineStats::default(),
            done: false,
        }
    }

    /// Lazily decode observations from in-memory lines
    pub fn run_lines<I, S>(
        &self,
        lines: I,
    ) -> ObservationIter<'_, D, impl Iterator<Item = Result<String>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(lines.into_iter().map(|line| Ok(line.into())))
    }

    /// Open a trace file and lazily decode it
    ///
    /// A missing or unopenable file fails here, before any line is read.
    pub fn run_file(&self, path: &Path) -> Result<ObservationIter<'_, D, TraceLines<BufReader<File>>>> {
        Ok(self.run(open_trace(path)?))
    }

    /// Run a line source to completion and summarize it
    pub fn analyze<I>(&self, lines: I) -> Result<TraceAnalysis>
    where
        I: IntoIterator<Item = Result<String>>,
    {
        let mut analyzer = TimeSeriesAnalyzer::new(self.config.consistency_triple.clone());
        let mut observations = self.run(lines);
        for observation in observations.by_ref() {
            analyzer.observe(&observation?);
        }

        Ok(TraceAnalysis {
            report: analyzer.finish(),
            stats: *observations.stats(),
        })
    }

    /// Analyze a trace file
    pub fn analyze_file(&self, path: &Path) -> Result<TraceAnalysis> {
        self.analyze(open_trace(path)?)
    }
}

/// Lazy, single-pass observation sequence of one run
pub struct ObservationIter<'a, D, I> {
    lines: I,
    parser: LineParser,
    pipeline: &'a TracePipeline<D>,
    stats: PipelineStats,
    done: bool,
}

impl<'a, D, I> ObservationIter<'a, D, I>
where
    D: SignalDictionary,
    I: Iterator<Item = Result<String>>,
{
    /// Counters so far
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Drain the remaining observations
    pub fn finish(mut self) -> Result<TraceRun> {
        let observations = self.by_ref().collect::<Result<Vec<_>>>()?;
        Ok(TraceRun {
            observations,
            stats: self.stats,
        })
    }

    fn process_line(&mut self, line: &str) -> Option<SignalObservation> {
        self.stats.lines_read += 1;

        let frame = match self.parser.parse_line(line) {
            LineOutcome::Frame(frame) => frame,
            LineOutcome::Skip => {
                self.stats.skipped_lines += 1;
                log::trace!("Skipping line {}", self.stats.lines_read);
                return None;
            }
            LineOutcome::Malformed(reason) => {
                self.stats.malformed_lines += 1;
                log::debug!("Malformed line {}: {}", self.stats.lines_read, reason);
                return None;
            }
        };

        self.stats.frames_accepted += 1;
        match classify_frame(
            &self.pipeline.dictionary,
            &frame,
            &self.pipeline.config.signal_names,
        ) {
            FrameOutcome::Observation(observation) => {
                self.stats.observations += 1;
                Some(observation)
            }
            FrameOutcome::UnknownIdentifier(_) => {
                self.stats.unknown_identifiers += 1;
                None
            }
            FrameOutcome::DecodeFailed(_) => {
                self.stats.decode_failures += 1;
                None
            }
            FrameOutcome::FilteredOut => {
                self.stats.filtered_out += 1;
                None
            }
        }
    }
}

impl<'a, D, I> Iterator for ObservationIter<'a, D, I>
where
    D: SignalDictionary,
    I: Iterator<Item = Result<String>>,
{
    type Item = Result<SignalObservation>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Some(observation) = self.process_line(&line) {
                        return Some(Ok(observation));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    self.parser.finish();
                    log::info!(
                        "Run finished: {} lines, {} frames, {} observations, {} malformed",
                        self.stats.lines_read,
                        self.stats.frames_accepted,
                        self.stats.observations,
                        self.stats.malformed_lines
                    );
                    return None;
                }
            }
        }
    }
}
