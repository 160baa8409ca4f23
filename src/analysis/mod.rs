//! Scenario analyses built on the orchestrator: tap search, EV penetration
//! and N-1 contingency.

pub mod contingency;
pub mod ev;
pub mod tap;

pub use contingency::{ContingencyReport, ContingencyRow, run_contingency};
pub use ev::{EvAssignment, EvReport, ev_count, run_ev_penetration};
pub use tap::{TapObjective, TapReport, TapScore, optimize};
