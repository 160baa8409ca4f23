//! Core simulation types: solver output per timestamp and batch outcomes.

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::SolverError;
use crate::grid::Id;

/// Solver output for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeResult {
    pub id: Id,
    /// Voltage magnitude (per-unit).
    pub u_pu: f64,
    /// Voltage angle (rad).
    pub u_angle: f64,
}

/// Solver output for one line.
///
/// `p_from` and `p_to` are both measured flowing into the line, so their sum
/// is the active power lost in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineResult {
    pub id: Id,
    /// Loading relative to the line rating (1.0 = 100 %).
    pub loading: f64,
    /// Active power into the line at its from-side (W).
    pub p_from: f64,
    /// Active power into the line at its to-side (W).
    pub p_to: f64,
}

impl LineResult {
    /// Active power loss (W).
    pub fn loss_w(&self) -> f64 {
        (self.p_from + self.p_to).abs()
    }
}

/// What the external solver returns for one grid variant and injection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOutput {
    pub nodes: Vec<NodeResult>,
    pub lines: Vec<LineResult>,
}

/// Complete record of one solved timestamp.
///
/// Created by the orchestrator, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    /// Timestamp index within the aligned profiles.
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub nodes: Vec<NodeResult>,
    pub lines: Vec<LineResult>,
}

impl ScenarioResult {
    pub(crate) fn new(index: usize, timestamp: NaiveDateTime, output: SolverOutput) -> Self {
        Self {
            index,
            timestamp,
            nodes: output.nodes,
            lines: output.lines,
        }
    }
}

/// A timestamp whose solve failed; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepFailure {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub error: SolverError,
}

impl fmt::Display for TimestepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={} ({}): {}", self.index, self.timestamp, self.error)
    }
}

/// Results of one orchestrator run: converged timestamps and failures, both
/// in timestamp order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<ScenarioResult>,
    pub failures: Vec<TimestepFailure>,
}

impl BatchOutcome {
    /// Total number of timestamps attempted.
    pub fn attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Returns `true` when every timestamp converged.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Identifies which scenario a summary row belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenarioId {
    Base,
    EvPenetration { level: f64, seed: u64 },
    Tap(i32),
    Contingency { removed: Id, alternative: Id },
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::EvPenetration { level, seed } => write!(f, "ev:{level}@{seed}"),
            Self::Tap(pos) => write!(f, "tap:{pos}"),
            Self::Contingency {
                removed,
                alternative,
            } => write!(f, "n-1:{removed}->{alternative}"),
        }
    }
}
