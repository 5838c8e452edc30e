//! Time-series analysis of decoded observations
//!
//! The analyzer consumes observations in arrival order and keeps only what the
//! report needs: the first and last timestamp, the first and last value of
//! every signal, per-signal sample counts, and any max/avg/min consistency
//! violations. It can be fed incrementally from the lazy pipeline or run over
//! a collected slice; both give the same report.

use crate::config::ConsistencyTriple;
use crate::types::SignalObservation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Rate of change per hour
///
/// Undefined when the trace spans no time at all; that state is kept
/// distinct instead of surfacing an infinite or NaN quotient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Rate {
    Defined(f64),
    Undefined,
}

impl Rate {
    fn per_hour(delta: f64, time_span: f64) -> Self {
        if time_span == 0.0 {
            Rate::Undefined
        } else {
            Rate::Defined(delta / (time_span / SECONDS_PER_HOUR))
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Rate::Defined(v) => Some(*v),
            Rate::Undefined => None,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Defined(v) => write!(f, "{:+.3}/h", v),
            Rate::Undefined => write!(f, "undefined"),
        }
    }
}

/// First/last summary of one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Value from the earliest observation carrying the signal
    pub first: f64,
    /// Value from the latest observation carrying the signal
    pub last: f64,
    /// `last - first`
    pub delta: f64,
    /// `delta` per hour of total trace span
    pub rate_per_hour: Rate,
    /// Number of observations carrying the signal
    pub samples: usize,
}

/// An observation where max >= avg >= min did not hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub timestamp: f64,
    pub max: f64,
    pub avg: f64,
    pub min: f64,
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@ {:.3}s: max {:.1}, avg {:.1}, min {:.1}",
            self.timestamp, self.max, self.avg, self.min
        )
    }
}

/// Summary of one trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Last minus first observation timestamp (0 with fewer than two)
    pub time_span: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub observation_count: usize,
    pub per_signal: BTreeMap<String, SignalSummary>,
    /// The triple that was checked, if any
    pub consistency_triple: Option<ConsistencyTriple>,
    /// Violations in arrival order
    pub consistency_violations: Vec<ConsistencyViolation>,
}

impl AnalysisReport {
    /// Report for a trace without observations
    pub fn empty(consistency_triple: Option<ConsistencyTriple>) -> Self {
        Self {
            time_span: 0.0,
            start_time: None,
            end_time: None,
            observation_count: 0,
            per_signal: BTreeMap::new(),
            consistency_triple,
            consistency_violations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observation_count == 0
    }

    pub fn is_consistent(&self) -> bool {
        self.consistency_violations.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Track {
    first: f64,
    last: f64,
    samples: usize,
}

/// Incremental analyzer over an ordered observation sequence
#[derive(Debug, Clone)]
pub struct TimeSeriesAnalyzer {
    triple: Option<ConsistencyTriple>,
    start_time: Option<f64>,
    end_time: Option<f64>,
    observation_count: usize,
    tracks: BTreeMap<String, Track>,
    violations: Vec<ConsistencyViolation>,
}

impl TimeSeriesAnalyzer {
    pub fn new(triple: Option<ConsistencyTriple>) -> Self {
        Self {
            triple,
            start_time: None,
            end_time: None,
            observation_count: 0,
            tracks: BTreeMap::new(),
            violations: Vec::new(),
        }
    }

    /// Feed the next observation in arrival order
    pub fn observe(&mut self, observation: &SignalObservation) {
        self.observation_count += 1;
        self.start_time.get_or_insert(observation.timestamp);
        self.end_time = Some(observation.timestamp);

        for (name, &value) in &observation.signals {
            self.tracks
                .entry(name.clone())
                .and_modify(|track| {
                    track.last = value;
                    track.samples += 1;
                })
                .or_insert(Track {
                    first: value,
                    last: value,
                    samples: 1,
                });
        }

        if let Some(violation) = self.check_consistency(observation) {
            log::debug!("Consistency violation {}", violation);
            self.violations.push(violation);
        }
    }

    fn check_consistency(&self, observation: &SignalObservation) -> Option<ConsistencyViolation> {
        let triple = self.triple.as_ref()?;
        let max = observation.get(&triple.max)?;
        let avg = observation.get(&triple.avg)?;
        let min = observation.get(&triple.min)?;

        // NaN compares false, so it fails the ordering
        if !(max >= avg && avg >= min) {
            Some(ConsistencyViolation {
                timestamp: observation.timestamp,
                max,
                avg,
                min,
            })
        } else {
            None
        }
    }

    /// Build the report from everything observed so far
    pub fn finish(self) -> AnalysisReport {
        let (Some(start_time), Some(end_time)) = (self.start_time, self.end_time) else {
            return AnalysisReport::empty(self.triple);
        };

        let time_span = if self.observation_count < 2 {
            0.0
        } else {
            end_time - start_time
        };

        let per_signal = self
            .tracks
            .into_iter()
            .map(|(name, track)| {
                let delta = track.last - track.first;
                let summary = SignalSummary {
                    first: track.first,
                    last: track.last,
                    delta,
                    rate_per_hour: Rate::per_hour(delta, time_span),
                    samples: track.samples,
                };
                (name, summary)
            })
            .collect();

        AnalysisReport {
            time_span,
            start_time: Some(start_time),
            end_time: Some(end_time),
            observation_count: self.observation_count,
            per_signal,
            consistency_triple: self.triple,
            consistency_violations: self.violations,
        }
    }

    /// One-shot analysis of an observation sequence
    pub fn summarize<'a, I>(mut self, observations: I) -> AnalysisReport
    where
        I: IntoIterator<Item = &'a SignalObservation>,
    {
        for observation in observations {
            self.observe(observation);
        }
        self.finish()
    }
}
