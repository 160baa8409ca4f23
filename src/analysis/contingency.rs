//! N-1 contingency: simulate every way of restoring supply after a line trips.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::grid::{Grid, GridVariant, Id, alternatives_for};
use crate::profile::AlignedProfiles;
use crate::sim::{BatchSummary, PowerFlowSolver, ScenarioId, SimulationOrchestrator};

/// Result of one reconfiguration: `removed_line` open, `alternative` closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyRow {
    pub removed_line: Id,
    pub alternative: Id,
    pub max_loading: f64,
    pub max_loading_line: Option<Id>,
    pub max_loading_timestamp: Option<NaiveDateTime>,
    pub min_u_pu: Option<f64>,
    pub max_u_pu: Option<f64>,
    pub energy_loss_kwh: f64,
    pub failed_timestamps: usize,
}

impl ContingencyRow {
    fn from_summary(removed_line: Id, alternative: Id, summary: &BatchSummary) -> Self {
        let peak = summary.peak_line();
        let range = summary.voltage_range();
        Self {
            removed_line,
            alternative,
            max_loading: summary.max_loading,
            max_loading_line: peak.map(|p| p.line),
            max_loading_timestamp: peak.map(|p| p.max_loading_timestamp),
            min_u_pu: range.map(|(min, _)| min),
            max_u_pu: range.map(|(_, max)| max),
            energy_loss_kwh: summary.total_energy_loss_kwh,
            failed_timestamps: summary.failures.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyReport {
    pub removed_line: Id,
    /// One row per alternative, in discovery order.
    pub rows: Vec<ContingencyRow>,
    /// Full summaries, parallel to `rows`.
    pub summaries: Vec<BatchSummary>,
}

impl ContingencyReport {
    /// Row with the lowest peak loading; first wins on ties.
    ///
    /// Rows with failed timestamps are only compared when no row converged
    /// everywhere, and rows without any converged timestamp never are.
    pub fn least_loaded(&self) -> Option<&ContingencyRow> {
        let complete = self.rows.iter().any(|r| r.failed_timestamps == 0);
        self.rows
            .iter()
            .filter(|r| r.max_loading_line.is_some())
            .filter(|r| !complete || r.failed_timestamps == 0)
            .fold(None, |best: Option<&ContingencyRow>, r| match best {
                Some(b) if b.max_loading <= r.max_loading => Some(b),
                _ => Some(r),
            })
    }
}

fn simulate_alternative<S: PowerFlowSolver>(
    orchestrator: &SimulationOrchestrator<'_, S>,
    grid: &Grid,
    profiles: &AlignedProfiles,
    removed_line: Id,
    alternative: Id,
) -> Result<BatchSummary, AnalysisError> {
    let variant = GridVariant::base(grid)
        .with_line_status(removed_line, false)?
        .with_line_status(alternative, true)?;
    variant.validate()?;
    debug!(removed_line, alternative, "simulating reconfiguration");
    let outcome = orchestrator.run(&variant, profiles);
    Ok(BatchSummary::from_outcome(
        ScenarioId::Contingency {
            removed: removed_line,
            alternative,
        },
        &outcome,
    ))
}

/// Opens `removed_line`, then simulates each alternative that restores a
/// radial grid.
///
/// # Errors
///
/// Topology errors for an unknown or already-open line, and
/// `NoAlternative` when the line has no redundancy.
pub fn run_contingency<S: PowerFlowSolver>(
    orchestrator: &SimulationOrchestrator<'_, S>,
    grid: &Grid,
    profiles: &AlignedProfiles,
    removed_line: Id,
) -> Result<ContingencyReport, AnalysisError> {
    let candidates = alternatives_for(grid, removed_line)?;
    if candidates.is_empty() {
        return Err(AnalysisError::NoAlternative { line: removed_line });
    }

    let summaries: Vec<BatchSummary> = if orchestrator.options().parallel {
        candidates
            .par_iter()
            .map(|&alt| simulate_alternative(orchestrator, grid, profiles, removed_line, alt))
            .collect::<Result<_, _>>()?
    } else {
        candidates
            .iter()
            .map(|&alt| simulate_alternative(orchestrator, grid, profiles, removed_line, alt))
            .collect::<Result<_, _>>()?
    };

    let rows: Vec<ContingencyRow> = candidates
        .iter()
        .zip(&summaries)
        .map(|(&alt, summary)| ContingencyRow::from_summary(removed_line, alt, summary))
        .collect();
    for row in &rows {
        info!(
            removed_line,
            alternative = row.alternative,
            max_loading = row.max_loading,
            failed = row.failed_timestamps,
            "contingency row"
        );
    }
    Ok(ContingencyReport {
        removed_line,
        rows,
        summaries,
    })
}
