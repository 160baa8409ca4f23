//! Alternative-line search for single-line outages.

use tracing::debug;

use super::model::Grid;
use super::types::Id;
use crate::error::TopologyError;

/// Which side of a cut each node lies on, by node position.
///
/// `true` = still supplied from the source.
fn supplied_side(grid: &Grid, removed_line: Id) -> Result<Vec<bool>, TopologyError> {
    let removed = grid
        .line_position(removed_line)
        .ok_or(TopologyError::UnknownLine { id: removed_line })?;
    if !grid.lines()[removed].in_service {
        return Err(TopologyError::LineAlreadyOutOfService { id: removed_line });
    }
    let lines = grid.lines();
    Ok(grid.reachable_from_source(&|pos| pos != removed && lines[pos].in_service))
}

/// Out-of-service lines whose closure restores a radial grid after
/// `removed_line` is opened, in declaration order.
///
/// On a tree, opening an in-service line leaves exactly two components. A
/// candidate has one endpoint in each, so closing it reconnects the grid
/// without forming a loop. An empty result means the line has no
/// redundancy.
///
/// # Errors
///
/// Returns `UnknownLine` if `removed_line` is not a line (the transformer is
/// not switchable) and `LineAlreadyOutOfService` if it is already open.
pub fn alternatives_for(grid: &Grid, removed_line: Id) -> Result<Vec<Id>, TopologyError> {
    let supplied = supplied_side(grid, removed_line)?;
    let side = |node: Id| grid.node_position(node).map(|pos| supplied[pos]);

    let candidates: Vec<Id> = grid
        .lines()
        .iter()
        .filter(|line| !line.in_service)
        .filter(|line| match (side(line.from_node), side(line.to_node)) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        })
        .map(|line| line.id)
        .collect();

    debug!(line = removed_line, ?candidates, "contingency alternatives");
    Ok(candidates)
}

/// Nodes that lose supply when `line` is opened, ascending.
///
/// # Errors
///
/// Same as [`alternatives_for`].
pub fn downstream_nodes(grid: &Grid, line: Id) -> Result<Vec<Id>, TopologyError> {
    let supplied = supplied_side(grid, line)?;
    let mut nodes: Vec<Id> = grid
        .nodes()
        .iter()
        .zip(&supplied)
        .filter(|(_, reached)| !**reached)
        .map(|(node, _)| node.id)
        .collect();
    nodes.sort_unstable();
    Ok(nodes)
}
