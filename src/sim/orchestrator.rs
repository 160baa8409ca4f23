//! Time-series driver that feeds one grid variant and every timestamp's
//! load injection to the solver.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::solver::PowerFlowSolver;
use super::types::{BatchOutcome, ScenarioResult, TimestepFailure};
use crate::grid::GridVariant;
use crate::profile::AlignedProfiles;

/// Execution options shared by every orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Fan timestamps (and contingency candidates) out over the rayon pool.
    pub parallel: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Runs batches of independent timestamps against a solver.
///
/// Holds only shared references; one orchestrator can serve many variants.
#[derive(Clone, Copy)]
pub struct SimulationOrchestrator<'s, S: PowerFlowSolver> {
    solver: &'s S,
    options: SimulationOptions,
}

impl<'s, S: PowerFlowSolver> SimulationOrchestrator<'s, S> {
    pub fn new(solver: &'s S, options: SimulationOptions) -> Self {
        Self { solver, options }
    }

    pub fn options(&self) -> SimulationOptions {
        self.options
    }

    /// Solves one timestamp.
    fn step(
        &self,
        variant: &GridVariant<'_>,
        profiles: &AlignedProfiles,
        t: usize,
    ) -> Result<ScenarioResult, TimestepFailure> {
        let injection = profiles.injection(t);
        self.solver
            .solve(variant, &injection)
            .map(|output| ScenarioResult::new(t, injection.timestamp, output))
            .map_err(|error| TimestepFailure {
                index: t,
                timestamp: injection.timestamp,
                error,
            })
    }

    /// Solves every timestamp of `profiles` on `variant`.
    ///
    /// Timestamps share no state, so with `parallel` they are solved on the
    /// rayon pool; results come back in timestamp order either way. A solver
    /// failure is recorded for its timestamp and the batch continues.
    pub fn run(&self, variant: &GridVariant<'_>, profiles: &AlignedProfiles) -> BatchOutcome {
        let total = profiles.len();
        debug!(
            solver = self.solver.name(),
            timestamps = total,
            tap = variant.tap_pos(),
            parallel = self.options.parallel,
            "starting batch"
        );

        let steps: Vec<Result<ScenarioResult, TimestepFailure>> = if self.options.parallel {
            (0..total)
                .into_par_iter()
                .map(|t| self.step(variant, profiles, t))
                .collect()
        } else {
            (0..total).map(|t| self.step(variant, profiles, t)).collect()
        };

        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        for step in steps {
            match step {
                Ok(result) => outcome.results.push(result),
                Err(failure) => {
                    warn!(%failure, "timestep failed");
                    outcome.failures.push(failure);
                }
            }
        }

        info!(
            converged = outcome.results.len(),
            failed = outcome.failures.len(),
            "batch finished"
        );
        outcome
    }
}
