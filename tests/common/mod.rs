//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use chrono::{Duration, NaiveDate, NaiveDateTime};

use lv_grid_sim::error::SolverError;
use lv_grid_sim::grid::{
    GridInput, GridVariant, Id, Line, Metadata, Node, Source, SymLoad, TapSetting, Transformer,
};
use lv_grid_sim::profile::{EvCurve, EvProfilePool, LoadInjection, LoadProfile};
use lv_grid_sim::session::{AnalysisSession, SessionInput};
use lv_grid_sim::sim::{LineResult, NodeResult, PowerFlowSolver, SimulationOptions, SolverOutput};

/// Sym_load ids, in grid declaration order.
pub const LOADS: [Id; 3] = [102, 103, 104];

/// Normally-open tie between nodes 3 and 4.
pub const TIE: Id = 34;

/// Five tap positions with the ratio rising 2.5 % per step.
pub const TAPS: [(i32, f64); 5] = [(-2, 0.95), (-1, 0.975), (0, 1.0), (1, 1.025), (2, 1.05)];

fn line(id: Id, from_node: Id, to_node: Id, in_service: bool) -> Line {
    Line {
        id,
        from_node,
        to_node,
        in_service,
    }
}

/// MV node 0 feeds LV busbar 1 through transformer 10; LV lines 12 (1-2),
/// 23 (2-3), 14 (1-4) and the open tie 34 (3-4).
pub fn grid_input_with_taps(taps: &[(i32, f64)], tap_pos: i32) -> GridInput {
    GridInput {
        nodes: vec![
            Node {
                id: 0,
                u_rated: 10_500.0,
            },
            Node {
                id: 1,
                u_rated: 400.0,
            },
            Node {
                id: 2,
                u_rated: 400.0,
            },
            Node {
                id: 3,
                u_rated: 400.0,
            },
            Node {
                id: 4,
                u_rated: 400.0,
            },
        ],
        lines: vec![
            line(12, 1, 2, true),
            line(23, 2, 3, true),
            line(14, 1, 4, true),
            line(TIE, 3, 4, false),
        ],
        sources: vec![Source { id: 1000, node: 0 }],
        transformers: vec![Transformer {
            id: 10,
            from_node: 0,
            to_node: 1,
            tap_pos,
            taps: taps
                .iter()
                .map(|&(position, ratio)| TapSetting { position, ratio })
                .collect(),
        }],
        sym_loads: vec![
            SymLoad { id: 102, node: 2 },
            SymLoad { id: 103, node: 3 },
            SymLoad { id: 104, node: 4 },
        ],
    }
}

/// Default fixture grid with [`TAPS`] at position 0.
pub fn grid_input() -> GridInput {
    grid_input_with_taps(&TAPS, 0)
}

/// The fixture grid without its tie line: no line has an alternative.
pub fn grid_input_without_tie() -> GridInput {
    let mut input = grid_input();
    input.lines.retain(|l| l.id != TIE);
    input
}

/// Feeders 12 (loads 102, 103) and 14 (load 104).
pub fn metadata() -> Metadata {
    Metadata {
        lv_busbar: 1,
        lv_feeders: vec![12, 14],
    }
}

/// `n` quarter-hour timestamps starting 2025-01-01 00:00.
pub fn timestamps(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|t| start + Duration::minutes(15 * t as i64))
        .collect()
}

/// Builds a profile, panicking on shape errors.
pub fn profile(ts: Vec<NaiveDateTime>, ids: Vec<Id>, values: Vec<Vec<f64>>) -> LoadProfile {
    LoadProfile::new(ts, ids, values).expect("fixture profile should be well formed")
}

/// Active power: 1 kW per load, rising by 200 W per timestamp.
pub fn active_profile(n: usize) -> LoadProfile {
    let values = (0..n)
        .map(|t| vec![1_000.0 + 200.0 * t as f64; LOADS.len()])
        .collect();
    profile(timestamps(n), LOADS.to_vec(), values)
}

/// Reactive power: a flat 100 var per load.
pub fn reactive_profile(n: usize) -> LoadProfile {
    profile(timestamps(n), LOADS.to_vec(), vec![vec![100.0; LOADS.len()]; n])
}

/// One curve per load: a 3 kW charger plugged in for the second half.
pub fn ev_pool(n: usize) -> EvProfilePool {
    EvProfilePool::new(
        (0..LOADS.len())
            .map(|_| {
                let p = (0..n)
                    .map(|t| if t >= n / 2 { 3_000.0 } else { 0.0 })
                    .collect();
                EvCurve::active(p)
            })
            .collect(),
    )
}

/// Full session input over `n` timestamps with EV pool and metadata.
pub fn session_input(grid: GridInput, n: usize) -> SessionInput {
    SessionInput {
        grid,
        active: active_profile(n),
        reactive: reactive_profile(n),
        ev_pool: Some(ev_pool(n)),
        metadata: Some(metadata()),
    }
}

/// Builds a session, panicking on invalid input.
pub fn session(input: SessionInput, solver: StubSolver) -> AnalysisSession<StubSolver> {
    AnalysisSession::new(input, solver, SimulationOptions::default())
        .expect("fixture session should build")
}

/// Deterministic stand-in for a power-flow engine.
///
/// Node voltage is `ratio * (1 - drop_per_hop * hops)` where `hops` counts
/// closed lines from the LV busbar; the MV node sits at 1.0. Each closed
/// line carries the load downstream of it, with loading `carried / rating_w`
/// and loss `loss_per_w2 * carried^2`.
#[derive(Debug, Clone, Copy)]
pub struct StubSolver {
    pub drop_per_hop: f64,
    pub rating_w: f64,
    pub loss_per_w2: f64,
    /// Fail with `NotConverged` when total active load exceeds this.
    pub fail_above_w: Option<f64>,
    /// Restricts `fail_above_w` to the tap with this ratio.
    pub fail_at_ratio: Option<f64>,
}

impl Default for StubSolver {
    fn default() -> Self {
        Self {
            drop_per_hop: 0.02,
            rating_w: 10_000.0,
            loss_per_w2: 1e-5,
            fail_above_w: None,
            fail_at_ratio: None,
        }
    }
}

impl PowerFlowSolver for StubSolver {
    fn solve(
        &self,
        grid: &GridVariant<'_>,
        injection: &LoadInjection<'_>,
    ) -> Result<SolverOutput, SolverError> {
        let total: f64 = injection.p.iter().sum();
        let at_ratio = self
            .fail_at_ratio
            .is_none_or(|r| (r - grid.tap_ratio()).abs() < 1e-12);
        if at_ratio && self.fail_above_w.is_some_and(|limit| total > limit) {
            return Err(SolverError::NotConverged { iterations: 30 });
        }

        let base = grid.grid();
        let busbar = base.transformer().to_node;

        let mut adjacency: HashMap<Id, Vec<(Id, Id)>> = HashMap::new();
        for l in grid.in_service_lines() {
            adjacency.entry(l.from_node).or_default().push((l.id, l.to_node));
            adjacency.entry(l.to_node).or_default().push((l.id, l.from_node));
        }

        // BFS from the busbar: hop count and feeding line per node.
        let mut hops: HashMap<Id, usize> = HashMap::from([(busbar, 0)]);
        let mut feeding: HashMap<Id, (Id, Id)> = HashMap::new();
        let mut order = vec![busbar];
        let mut queue = VecDeque::from([busbar]);
        while let Some(node) = queue.pop_front() {
            let depth = hops.get(&node).copied().unwrap_or(0) + 1;
            for &(line, next) in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if hops.contains_key(&next) {
                    continue;
                }
                hops.insert(next, depth);
                feeding.insert(next, (line, node));
                order.push(next);
                queue.push_back(next);
            }
        }

        let mut carried: HashMap<Id, f64> = HashMap::new();
        for (load, p) in injection.load_ids.iter().zip(injection.p) {
            if let Some(sym) = base.sym_loads().iter().find(|s| s.id == *load) {
                *carried.entry(sym.node).or_default() += p;
            }
        }
        let mut lines = Vec::new();
        for node in order.iter().rev() {
            if let Some(&(line, parent)) = feeding.get(node) {
                let flow = carried.get(node).copied().unwrap_or(0.0);
                *carried.entry(parent).or_default() += flow;
                let loss = self.loss_per_w2 * flow * flow;
                lines.push(LineResult {
                    id: line,
                    loading: flow / self.rating_w,
                    p_from: flow + loss,
                    p_to: -flow,
                });
            }
        }
        lines.sort_by_key(|l| l.id);

        let ratio = grid.tap_ratio();
        let nodes = base
            .nodes()
            .iter()
            .map(|n| {
                let u_pu = match hops.get(&n.id) {
                    Some(&h) => ratio * (1.0 - self.drop_per_hop * h as f64),
                    None => 1.0,
                };
                NodeResult {
                    id: n.id,
                    u_pu,
                    u_angle: 0.0,
                }
            })
            .collect();

        Ok(SolverOutput { nodes, lines })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
