pub mod orchestrator;
/// Boundary to the external power-flow engine.
pub mod solver;
pub mod summary;
pub mod types;

pub use orchestrator::{SimulationOptions, SimulationOrchestrator};
pub use solver::PowerFlowSolver;
pub use summary::{BatchSummary, LineLoadingStats, NodeVoltageStats, VoltageRow};
pub use types::{
    BatchOutcome, LineResult, NodeResult, ScenarioId, ScenarioResult, SolverOutput,
    TimestepFailure,
};
