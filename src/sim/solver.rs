//! Boundary to the external power-flow engine.

use super::types::SolverOutput;
use crate::error::SolverError;
use crate::grid::GridVariant;
use crate::profile::LoadInjection;

/// A steady-state power-flow engine.
///
/// Implementations receive the scenario's grid variant (line statuses and
/// tap position already applied) and one timestamp's load injection, and
/// return per-node voltages and per-line loading. They must be stateless
/// across calls; the orchestrator may call `solve` from several threads at
/// once.
pub trait PowerFlowSolver: Sync {
    /// Solves one timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] when the engine fails for this input, e.g.
    /// on non-convergence. The failure is isolated to this timestamp.
    fn solve(
        &self,
        grid: &GridVariant<'_>,
        injection: &LoadInjection<'_>,
    ) -> Result<SolverOutput, SolverError>;

    /// Human-readable engine name for logs.
    fn name(&self) -> &'static str {
        "external"
    }
}

impl<S: PowerFlowSolver + ?Sized> PowerFlowSolver for &S {
    fn solve(
        &self,
        grid: &GridVariant<'_>,
        injection: &LoadInjection<'_>,
    ) -> Result<SolverOutput, SolverError> {
        (**self).solve(grid, injection)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
