//! Exhaustive search over the transformer's declared tap positions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::grid::{Grid, GridVariant};
use crate::profile::AlignedProfiles;
use crate::sim::{BatchSummary, PowerFlowSolver, ScenarioId, SimulationOrchestrator};

/// What the tap search minimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapObjective {
    /// Total line energy loss over the horizon (kWh).
    #[serde(rename = "minimal_energy_loss")]
    MinimalEnergyLoss,
    /// Largest `|u_pu - 1|` over all nodes and timestamps.
    #[serde(rename = "minimal_deviation_u_pu")]
    MinimalVoltageDeviation,
}

impl TapObjective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimalEnergyLoss => "minimal_energy_loss",
            Self::MinimalVoltageDeviation => "minimal_deviation_u_pu",
        }
    }

    fn score(self, summary: &BatchSummary) -> f64 {
        match self {
            Self::MinimalEnergyLoss => summary.total_energy_loss_kwh,
            Self::MinimalVoltageDeviation => summary.max_voltage_deviation_pu,
        }
    }
}

impl fmt::Display for TapObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TapObjective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal_energy_loss" => Ok(Self::MinimalEnergyLoss),
            "minimal_deviation_u_pu" => Ok(Self::MinimalVoltageDeviation),
            other => Err(format!(
                "unknown tap objective '{other}' (expected minimal_energy_loss or minimal_deviation_u_pu)"
            )),
        }
    }
}

/// Outcome of one tap position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapScore {
    pub position: i32,
    pub ratio: f64,
    /// `None` when the position was not ranked: nothing converged, or it
    /// failed somewhere while another position converged everywhere.
    pub score: Option<f64>,
    pub converged: usize,
    pub failed: usize,
}

/// Result of a tap search.
#[derive(Debug, Clone, PartialEq)]
pub struct TapReport {
    pub objective: TapObjective,
    pub best_position: i32,
    pub best_score: f64,
    /// One entry per declared position, ascending.
    pub scores: Vec<TapScore>,
    /// Full summary of the winning position.
    pub summary: BatchSummary,
}

/// Simulates every declared tap position and returns the best one.
///
/// Only positions that converged at every timestamp are ranked, so a
/// position is never scored on a shorter horizon than its rivals. When no
/// position converges everywhere, each one is scored on the timestamps it
/// did converge. Positions are ranked in ascending order and a later
/// position only wins with a strictly smaller score, so ties resolve to the
/// lowest position.
///
/// # Errors
///
/// `NoFeasibleTap` when no position has a single converged timestamp.
pub fn optimize<S: PowerFlowSolver>(
    orchestrator: &SimulationOrchestrator<'_, S>,
    grid: &Grid,
    profiles: &AlignedProfiles,
    objective: TapObjective,
) -> Result<TapReport, AnalysisError> {
    let positions = grid.transformer().positions_ascending();
    let mut evaluated = Vec::with_capacity(positions.len());
    for &position in &positions {
        let variant = GridVariant::base(grid).with_tap(position)?;
        let outcome = orchestrator.run(&variant, profiles);
        let summary = BatchSummary::from_outcome(ScenarioId::Tap(position), &outcome);
        evaluated.push((position, variant.tap_ratio(), summary));
    }

    let any_complete = evaluated
        .iter()
        .any(|(_, _, s)| s.converged > 0 && s.failures.is_empty());
    if !any_complete {
        warn!("no tap position converged at every timestamp, scoring partial horizons");
    }

    let mut scores = Vec::with_capacity(evaluated.len());
    let mut best: Option<(i32, f64, BatchSummary)> = None;
    for (position, ratio, summary) in evaluated {
        let rankable = summary.converged > 0 && (!any_complete || summary.failures.is_empty());
        let score = rankable.then(|| objective.score(&summary));
        debug!(position, ratio, ?score, failed = summary.failures.len(), "tap evaluated");

        scores.push(TapScore {
            position,
            ratio,
            score,
            converged: summary.converged,
            failed: summary.failures.len(),
        });

        if let Some(score) = score {
            let better = best.as_ref().is_none_or(|(_, s, _)| score < *s);
            if better {
                best = Some((position, score, summary));
            }
        }
    }

    let (best_position, best_score, summary) = best.ok_or(AnalysisError::NoFeasibleTap {
        positions: positions.len(),
    })?;
    info!(
        objective = %objective,
        position = best_position,
        score = best_score,
        "best tap position"
    );
    Ok(TapReport {
        objective,
        best_position,
        best_score,
        scores,
        summary,
    })
}
