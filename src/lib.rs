//! Time-series load-flow analysis for radial low-voltage distribution grids.
//!
//! A grid is validated once into an immutable [`grid::Grid`]; scenarios are
//! expressed as copy-on-write [`grid::GridVariant`]s and solved timestamp by
//! timestamp through a pluggable [`sim::PowerFlowSolver`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod grid;
pub mod io;
pub mod profile;
pub mod session;
/// Solver boundary, batch orchestration and result aggregation.
pub mod sim;
