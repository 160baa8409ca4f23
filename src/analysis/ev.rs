//! EV penetration: add charging curves to a random share of the loads.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::grid::{Grid, GridVariant, Id, Metadata, loads_by_feeder};
use crate::profile::AlignedProfiles;
use crate::sim::{BatchSummary, PowerFlowSolver, ScenarioId, SimulationOrchestrator};

/// Absorbs float noise in `level * n` so that e.g. 0.3 * 10 yields 3, not 4.
const COUNT_TOLERANCE: f64 = 1e-9;

/// One load that received an EV curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvAssignment {
    pub load: Id,
    /// Index into the EV profile pool.
    pub curve: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvReport {
    pub level: f64,
    pub seed: u64,
    /// In the order the loads were drawn.
    pub assignments: Vec<EvAssignment>,
    /// EVs per LV feeder; only filled when metadata is available.
    pub evs_per_feeder: Option<BTreeMap<Id, usize>>,
    pub summary: BatchSummary,
}

impl EvReport {
    pub fn ev_count(&self) -> usize {
        self.assignments.len()
    }
}

/// Number of loads that get an EV: `ceil(level * loads)`.
pub fn ev_count(level: f64, loads: usize) -> usize {
    let exact = level * loads as f64;
    ((exact - COUNT_TOLERANCE).ceil().max(0.0) as usize).min(loads)
}

/// Draws which loads get which curves.
///
/// The RNG is local to the call, so the draw depends only on `seed`.
/// Curves are drawn without replacement.
fn draw(load_ids: &[Id], pool_len: usize, count: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cols: Vec<usize> = (0..load_ids.len()).collect();
    let mut curves: Vec<usize> = (0..pool_len).collect();
    cols.shuffle(&mut rng);
    curves.shuffle(&mut rng);
    cols.into_iter().zip(curves).take(count).collect()
}

/// Runs the batch with EV curves added to `ceil(level * n)` randomly chosen
/// loads.
///
/// # Errors
///
/// `InvalidPenetrationLevel` when `level` is outside `[0, 1]`,
/// `MissingEvPool` when the profiles carry no EV pool, and topology errors
/// from the metadata when it does not describe `grid`.
pub fn run_ev_penetration<S: PowerFlowSolver>(
    orchestrator: &SimulationOrchestrator<'_, S>,
    grid: &Grid,
    profiles: &AlignedProfiles,
    metadata: Option<&Metadata>,
    level: f64,
    seed: u64,
) -> Result<EvReport, AnalysisError> {
    if !(0.0..=1.0).contains(&level) {
        return Err(AnalysisError::InvalidPenetrationLevel { level });
    }
    let pool = profiles.ev_pool().ok_or(AnalysisError::MissingEvPool)?;

    let count = ev_count(level, profiles.load_ids().len());
    let picks = draw(profiles.load_ids(), pool.len(), count, seed);

    let mut scenario = profiles.clone();
    let mut assignments = Vec::with_capacity(picks.len());
    for (col, curve) in picks {
        scenario = scenario.with_added_curve(col, &pool.curves()[curve]);
        assignments.push(EvAssignment {
            load: profiles.load_ids()[col],
            curve,
        });
    }
    debug!(level, seed, evs = assignments.len(), "EV curves assigned");

    let evs_per_feeder = match metadata {
        Some(meta) => {
            let feeders = loads_by_feeder(grid, meta)?;
            Some(
                feeders
                    .into_iter()
                    .map(|(feeder, loads)| {
                        let n = assignments
                            .iter()
                            .filter(|a| loads.contains(&a.load))
                            .count();
                        (feeder, n)
                    })
                    .collect(),
            )
        }
        None => None,
    };

    let outcome = orchestrator.run(&GridVariant::base(grid), &scenario);
    let summary = BatchSummary::from_outcome(ScenarioId::EvPenetration { level, seed }, &outcome);
    info!(
        level,
        seed,
        evs = assignments.len(),
        max_loading = summary.max_loading,
        "EV penetration finished"
    );
    Ok(EvReport {
        level,
        seed,
        assignments,
        evs_per_feeder,
        summary,
    })
}
