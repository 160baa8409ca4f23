//! Post-hoc aggregation of a batch into voltage and loading statistics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use super::types::{BatchOutcome, ScenarioId, ScenarioResult, TimestepFailure};
use crate::grid::Id;

/// Extreme node voltages of one converged timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageRow {
    pub timestamp: NaiveDateTime,
    pub max_u_pu_node: Id,
    pub max_u_pu: f64,
    pub min_u_pu_node: Id,
    pub min_u_pu: f64,
}

/// Voltage range of one node across the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeVoltageStats {
    pub node: Id,
    pub min_u_pu: f64,
    pub max_u_pu: f64,
    pub mean_u_pu: f64,
}

/// Loading range and energy loss of one line across the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLoadingStats {
    pub line: Id,
    /// Trapezoidal integral of the line's active power loss (kWh).
    pub energy_loss_kwh: f64,
    pub max_loading: f64,
    pub max_loading_timestamp: NaiveDateTime,
    pub min_loading: f64,
    pub min_loading_timestamp: NaiveDateTime,
}

/// Aggregate view of one scenario's batch.
///
/// Computed from the converged results only; failed timestamps are carried
/// along so the caller can see how much of the horizon is covered.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub scenario: ScenarioId,
    pub voltage_rows: Vec<VoltageRow>,
    /// Sorted by node id.
    pub node_stats: Vec<NodeVoltageStats>,
    /// Sorted by line id.
    pub line_stats: Vec<LineLoadingStats>,
    /// Sum of every line's energy loss (kWh).
    pub total_energy_loss_kwh: f64,
    /// Largest `|u_pu - 1|` over all nodes and timestamps.
    pub max_voltage_deviation_pu: f64,
    /// Largest loading over all lines and timestamps.
    pub max_loading: f64,
    /// Number of converged timestamps.
    pub converged: usize,
    pub failures: Vec<TimestepFailure>,
}

#[derive(Default)]
struct NodeAccumulator {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

struct LineAccumulator {
    energy_wh: f64,
    last: Option<(f64, f64)>,
    max: (f64, NaiveDateTime),
    min: (f64, NaiveDateTime),
}

fn voltage_row(result: &ScenarioResult) -> Option<VoltageRow> {
    let first = result.nodes.first()?;
    let mut row = VoltageRow {
        timestamp: result.timestamp,
        max_u_pu_node: first.id,
        max_u_pu: first.u_pu,
        min_u_pu_node: first.id,
        min_u_pu: first.u_pu,
    };
    for node in &result.nodes[1..] {
        if node.u_pu > row.max_u_pu {
            row.max_u_pu = node.u_pu;
            row.max_u_pu_node = node.id;
        }
        if node.u_pu < row.min_u_pu {
            row.min_u_pu = node.u_pu;
            row.min_u_pu_node = node.id;
        }
    }
    Some(row)
}

impl BatchSummary {
    /// Aggregates a batch outcome.
    ///
    /// Energy loss integrates `|p_from + p_to|` with the trapezoid rule over
    /// hours elapsed since the first converged timestamp. A batch with a
    /// single converged timestamp therefore reports zero energy.
    pub fn from_outcome(scenario: ScenarioId, outcome: &BatchOutcome) -> Self {
        let mut voltage_rows = Vec::with_capacity(outcome.results.len());
        let mut nodes: BTreeMap<Id, NodeAccumulator> = BTreeMap::new();
        let mut lines: BTreeMap<Id, LineAccumulator> = BTreeMap::new();
        let mut max_dev = 0.0_f64;
        let mut max_loading = 0.0_f64;

        let origin = outcome.results.first().map(|r| r.timestamp);

        for result in &outcome.results {
            if let Some(row) = voltage_row(result) {
                voltage_rows.push(row);
            }

            for node in &result.nodes {
                max_dev = max_dev.max((node.u_pu - 1.0).abs());
                let acc = nodes.entry(node.id).or_insert_with(|| NodeAccumulator {
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                    ..NodeAccumulator::default()
                });
                acc.min = acc.min.min(node.u_pu);
                acc.max = acc.max.max(node.u_pu);
                acc.sum += node.u_pu;
                acc.count += 1;
            }

            let hours = origin
                .map(|o| (result.timestamp - o).num_seconds() as f64 / 3600.0)
                .unwrap_or(0.0);
            for line in &result.lines {
                max_loading = max_loading.max(line.loading);
                let loss = line.loss_w();
                let acc = lines.entry(line.id).or_insert(LineAccumulator {
                    energy_wh: 0.0,
                    last: None,
                    max: (line.loading, result.timestamp),
                    min: (line.loading, result.timestamp),
                });
                if let Some((prev_h, prev_loss)) = acc.last {
                    acc.energy_wh += (hours - prev_h) * (prev_loss + loss) / 2.0;
                }
                acc.last = Some((hours, loss));
                if line.loading > acc.max.0 {
                    acc.max = (line.loading, result.timestamp);
                }
                if line.loading < acc.min.0 {
                    acc.min = (line.loading, result.timestamp);
                }
            }
        }

        let node_stats: Vec<NodeVoltageStats> = nodes
            .into_iter()
            .map(|(node, acc)| NodeVoltageStats {
                node,
                min_u_pu: acc.min,
                max_u_pu: acc.max,
                mean_u_pu: acc.sum / acc.count as f64,
            })
            .collect();

        let line_stats: Vec<LineLoadingStats> = lines
            .into_iter()
            .map(|(line, acc)| LineLoadingStats {
                line,
                energy_loss_kwh: acc.energy_wh / 1000.0,
                max_loading: acc.max.0,
                max_loading_timestamp: acc.max.1,
                min_loading: acc.min.0,
                min_loading_timestamp: acc.min.1,
            })
            .collect();

        let total_energy_loss_kwh = line_stats.iter().map(|l| l.energy_loss_kwh).sum();

        Self {
            scenario,
            voltage_rows,
            node_stats,
            line_stats,
            total_energy_loss_kwh,
            max_voltage_deviation_pu: max_dev,
            max_loading,
            converged: outcome.results.len(),
            failures: outcome.failures.clone(),
        }
    }

    /// Line with the highest loading and when it occurred.
    pub fn peak_line(&self) -> Option<&LineLoadingStats> {
        self.line_stats
            .iter()
            .fold(None, |best: Option<&LineLoadingStats>, l| match best {
                Some(b) if b.max_loading >= l.max_loading => Some(b),
                _ => Some(l),
            })
    }

    /// Lowest and highest node voltage over the batch.
    pub fn voltage_range(&self) -> Option<(f64, f64)> {
        if self.node_stats.is_empty() {
            return None;
        }
        let min = self
            .node_stats
            .iter()
            .map(|n| n.min_u_pu)
            .fold(f64::INFINITY, f64::min);
        let max = self
            .node_stats
            .iter()
            .map(|n| n.max_u_pu)
            .fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Scenario {} ---", self.scenario)?;
        writeln!(
            f,
            "Timestamps:            {} converged, {} failed",
            self.converged,
            self.failures.len()
        )?;
        if let Some((min, max)) = self.voltage_range() {
            writeln!(f, "Voltage range:         {min:.4} .. {max:.4} p.u.")?;
        }
        writeln!(
            f,
            "Max voltage deviation: {:.4} p.u.",
            self.max_voltage_deviation_pu
        )?;
        match self.peak_line() {
            Some(peak) => writeln!(
                f,
                "Max loading:           {:.1}% (line {} at {})",
                peak.max_loading * 100.0,
                peak.line,
                peak.max_loading_timestamp
            )?,
            None => writeln!(f, "Max loading:           n/a")?,
        }
        write!(
            f,
            "Energy loss:           {:.3} kWh",
            self.total_energy_loss_kwh
        )
    }
}
