//! One validated grid with its aligned profiles, ready for repeated analyses.

use tracing::info;

use crate::analysis::{self, ContingencyReport, EvReport, TapObjective, TapReport};
use crate::error::{AnalysisError, TopologyError};
use crate::grid::{Grid, GridInput, GridVariant, Id, Metadata, validate_metadata};
use crate::profile::{AlignedProfiles, EvProfilePool, LoadProfile, align};
use crate::sim::{
    BatchSummary, PowerFlowSolver, ScenarioId, SimulationOptions, SimulationOrchestrator,
};

/// Everything a session is built from.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub grid: GridInput,
    pub active: LoadProfile,
    pub reactive: LoadProfile,
    pub ev_pool: Option<EvProfilePool>,
    pub metadata: Option<Metadata>,
}

/// Validated inputs plus a solver.
///
/// The grid and profiles are checked once on construction; every analysis
/// afterwards works on read-only views of them.
pub struct AnalysisSession<S: PowerFlowSolver> {
    grid: Grid,
    profiles: AlignedProfiles,
    metadata: Option<Metadata>,
    solver: S,
    options: SimulationOptions,
}

impl<S: PowerFlowSolver> AnalysisSession<S> {
    /// Builds the grid, checks the metadata against it and aligns the profiles.
    ///
    /// # Errors
    ///
    /// Returns the first topology or profile error found.
    pub fn new(
        input: SessionInput,
        solver: S,
        options: SimulationOptions,
    ) -> Result<Self, AnalysisError> {
        let grid = Grid::build(input.grid)?;
        if let Some(meta) = &input.metadata {
            validate_metadata(&grid, meta)?;
        }
        let profiles = align(&grid, &input.active, &input.reactive, input.ev_pool)?;
        info!(
            nodes = grid.nodes().len(),
            loads = grid.sym_loads().len(),
            timestamps = profiles.len(),
            solver = solver.name(),
            "analysis session ready"
        );
        Ok(Self {
            grid,
            profiles,
            metadata: input.metadata,
            solver,
            options,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn profiles(&self) -> &AlignedProfiles {
        &self.profiles
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn orchestrator(&self) -> SimulationOrchestrator<'_, S> {
        SimulationOrchestrator::new(&self.solver, self.options)
    }

    /// Re-checks the base topology.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` or `NotConnected`.
    pub fn validate_grid(&self) -> Result<(), TopologyError> {
        GridVariant::base(&self.grid).validate()
    }

    /// Simulates the unmodified grid.
    pub fn run_base_case(&self) -> BatchSummary {
        let outcome = self
            .orchestrator()
            .run(&GridVariant::base(&self.grid), &self.profiles);
        BatchSummary::from_outcome(ScenarioId::Base, &outcome)
    }

    /// See [`analysis::run_ev_penetration`].
    ///
    /// # Errors
    ///
    /// `InvalidPenetrationLevel` or `MissingEvPool`.
    pub fn run_ev_penetration(&self, level: f64, seed: u64) -> Result<EvReport, AnalysisError> {
        analysis::run_ev_penetration(
            &self.orchestrator(),
            &self.grid,
            &self.profiles,
            self.metadata.as_ref(),
            level,
            seed,
        )
    }

    /// See [`analysis::optimize`].
    ///
    /// # Errors
    ///
    /// `NoFeasibleTap` when no tap position converges.
    pub fn optimize_tap(&self, objective: TapObjective) -> Result<TapReport, AnalysisError> {
        analysis::optimize(&self.orchestrator(), &self.grid, &self.profiles, objective)
    }

    /// See [`analysis::run_contingency`].
    ///
    /// # Errors
    ///
    /// `NoAlternative` when `line` has no redundancy; topology errors for an
    /// unknown or already-open line.
    pub fn run_contingency(&self, line: Id) -> Result<ContingencyReport, AnalysisError> {
        analysis::run_contingency(&self.orchestrator(), &self.grid, &self.profiles, line)
    }
}
