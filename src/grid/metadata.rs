//! LV feeder metadata: which lines leave the LV busbar and what they supply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::contingency::downstream_nodes;
use super::model::Grid;
use super::types::Id;
use crate::error::TopologyError;

/// Supplementary grid attributes that the solver does not need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Low-voltage node of the transformer.
    pub lv_busbar: Id,
    /// Lines leaving the LV busbar, one per feeder.
    pub lv_feeders: Vec<Id>,
}

/// Checks that the metadata describes this grid.
///
/// # Errors
///
/// `BusbarMismatch` if `lv_busbar` is not the transformer's `to_node`,
/// `UnknownFeeder` if a feeder id is not a line, `FeederNotOnBusbar` if a
/// feeder line does not start at the busbar.
pub fn validate_metadata(grid: &Grid, meta: &Metadata) -> Result<(), TopologyError> {
    let expected = grid.transformer().to_node;
    if meta.lv_busbar != expected {
        return Err(TopologyError::BusbarMismatch {
            busbar: meta.lv_busbar,
            expected,
        });
    }

    for &feeder in &meta.lv_feeders {
        let line = grid
            .line(feeder)
            .ok_or(TopologyError::UnknownFeeder { id: feeder })?;
        if line.from_node != meta.lv_busbar {
            return Err(TopologyError::FeederNotOnBusbar {
                id: feeder,
                from_node: line.from_node,
                busbar: meta.lv_busbar,
            });
        }
    }
    Ok(())
}

/// Sym_load ids supplied through each feeder.
///
/// Feeders that are out of service supply nothing and map to an empty list.
///
/// # Errors
///
/// Propagates [`validate_metadata`] failures.
pub fn loads_by_feeder(
    grid: &Grid,
    meta: &Metadata,
) -> Result<BTreeMap<Id, Vec<Id>>, TopologyError> {
    validate_metadata(grid, meta)?;

    let mut out = BTreeMap::new();
    for &feeder in &meta.lv_feeders {
        let nodes = match downstream_nodes(grid, feeder) {
            Ok(nodes) => nodes,
            Err(TopologyError::LineAlreadyOutOfService { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        let loads = grid
            .sym_loads()
            .iter()
            .filter(|l| nodes.binary_search(&l.node).is_ok())
            .map(|l| l.id)
            .collect();
        out.insert(feeder, loads);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::types::{GridInput, Line, Node, Source, SymLoad, TapSetting, Transformer};

    /// 0 =T= 1, feeders 1 - 2 (11) and 1 - 3 (12), 3 - 4 (13).
    fn grid() -> Grid {
        let line = |id, from_node, to_node| Line {
            id,
            from_node,
            to_node,
            in_service: true,
        };
        let input = GridInput {
            nodes: (0..5)
                .map(|id| Node {
                    id,
                    u_rated: 400.0,
                })
                .collect(),
            lines: vec![line(11, 1, 2), line(12, 1, 3), line(13, 3, 4)],
            sources: vec![Source { id: 20, node: 0 }],
            transformers: vec![Transformer {
                id: 10,
                from_node: 0,
                to_node: 1,
                tap_pos: 0,
                taps: vec![TapSetting {
                    position: 0,
                    ratio: 1.0,
                }],
            }],
            sym_loads: vec![
                SymLoad { id: 30, node: 2 },
                SymLoad { id: 31, node: 3 },
                SymLoad { id: 32, node: 4 },
            ],
        };
        Grid::build(input).expect("fixture grid should be valid")
    }

    #[test]
    fn loads_grouped_per_feeder() {
        let g = grid();
        let meta = Metadata {
            lv_busbar: 1,
            lv_feeders: vec![11, 12],
        };
        let groups = loads_by_feeder(&g, &meta).unwrap();
        assert_eq!(groups.get(&11), Some(&vec![30]));
        assert_eq!(groups.get(&12), Some(&vec![31, 32]));
    }

    #[test]
    fn wrong_busbar_rejected() {
        let g = grid();
        let meta = Metadata {
            lv_busbar: 3,
            lv_feeders: vec![13],
        };
        assert_eq!(
            validate_metadata(&g, &meta),
            Err(TopologyError::BusbarMismatch {
                busbar: 3,
                expected: 1
            })
        );
    }

    #[test]
    fn feeder_must_leave_busbar() {
        let g = grid();
        let meta = Metadata {
            lv_busbar: 1,
            lv_feeders: vec![11, 13],
        };
        assert_eq!(
            validate_metadata(&g, &meta),
            Err(TopologyError::FeederNotOnBusbar {
                id: 13,
                from_node: 3,
                busbar: 1
            })
        );
    }

    #[test]
    fn unknown_feeder_rejected() {
        let g = grid();
        let meta = Metadata {
            lv_busbar: 1,
            lv_feeders: vec![99],
        };
        assert_eq!(
            validate_metadata(&g, &meta),
            Err(TopologyError::UnknownFeeder { id: 99 })
        );
    }
}
