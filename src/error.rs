//! Error types shared across grid validation, profile alignment, and analysis.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::grid::types::Id;

/// Structural problems found while building or re-validating a grid.
///
/// Every variant names the element that caused it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("expected exactly one source, found {count}")]
    MultipleOrMissingSource { count: usize },

    #[error("expected exactly one transformer, found {count}")]
    MultipleOrMissingTransformer { count: usize },

    #[error("id {id} is used by more than one element")]
    DuplicateId { id: Id },

    #[error("element {id} connects a node to itself")]
    SelfLoop { id: Id },

    #[error("{element} {id} references non-existent node {node}")]
    DanglingReference {
        element: &'static str,
        id: Id,
        node: Id,
    },

    #[error("transformer {id} has an invalid tap table: {reason}")]
    InvalidTapTable { id: Id, reason: String },

    #[error("tap position {position} is not declared by transformer {id}")]
    UnknownTapPosition { id: Id, position: i32 },

    #[error("cycle detected through edge {edge}")]
    CycleDetected { edge: Id },

    #[error("nodes {nodes:?} are not reachable from the source")]
    NotConnected { nodes: Vec<Id> },

    #[error("{id} is not a line of this grid")]
    UnknownLine { id: Id },

    #[error("line {id} is already out of service")]
    LineAlreadyOutOfService { id: Id },

    #[error("lv_busbar {busbar} is not the transformer's low-voltage node {expected}")]
    BusbarMismatch { busbar: Id, expected: Id },

    #[error("feeder {id} is not a line of this grid")]
    UnknownFeeder { id: Id },

    #[error("feeder {id} leaves node {from_node}, not the lv_busbar {busbar}")]
    FeederNotOnBusbar { id: Id, from_node: Id, busbar: Id },
}

/// Misalignment between load profiles, the grid, and the EV pool.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("{profile} profile has {rows} rows for {timestamps} timestamps")]
    Shape {
        profile: &'static str,
        timestamps: usize,
        rows: usize,
    },

    #[error("{profile} profile row {row} has {actual} values for {expected} loads")]
    RowWidth {
        profile: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{profile} profile has no timestamps")]
    Empty { profile: &'static str },

    #[error("{profile} profile load ids differ from sym_loads: missing {missing:?}, unexpected {unexpected:?}")]
    LoadIdMismatch {
        profile: &'static str,
        missing: Vec<Id>,
        unexpected: Vec<Id>,
    },

    #[error("active profile has {active} timestamps, reactive has {reactive}")]
    TimestampLengthMismatch { active: usize, reactive: usize },

    #[error("timestamp {index} differs: active {active}, reactive {reactive}")]
    TimestampMismatch {
        index: usize,
        active: NaiveDateTime,
        reactive: NaiveDateTime,
    },

    #[error("timestamp {index} is not after its predecessor")]
    NonMonotonicTimestamps { index: usize },

    #[error("EV pool has {available} profiles but the grid has {required} sym_loads")]
    InsufficientEvProfiles { available: usize, required: usize },

    #[error("EV profile {curve} has {actual} values, expected {expected}")]
    EvCurveLength {
        curve: usize,
        expected: usize,
        actual: usize,
    },
}

/// Failure of the external power-flow engine for a single unit of work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("power flow did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("solver rejected input: {0}")]
    InvalidInput(String),

    #[error("solver error: {0}")]
    Other(String),
}

/// Errors surfaced by the use-case drivers and the session API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("no out-of-service line can restore supply after removing line {line}")]
    NoAlternative { line: Id },

    #[error("penetration level {level} is outside [0, 1]")]
    InvalidPenetrationLevel { level: f64 },

    #[error("EV penetration analysis requires an EV profile pool")]
    MissingEvPool,

    #[error("every tap position failed to produce a converged timestep ({positions} tried)")]
    NoFeasibleTap { positions: usize },
}

/// Failures while reading grid or metadata documents.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("cannot read \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in \"{path}\": {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
