//! Grid element descriptions as supplied by the caller.

use serde::{Deserialize, Serialize};

/// Element identifier, unique across every element kind of one grid.
pub type Id = i64;

/// A busbar or connection point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    /// Rated line-to-line voltage (V).
    pub u_rated: f64,
}

/// A cable or overhead line between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: Id,
    pub from_node: Id,
    pub to_node: Id,
    /// Whether the line is closed at load time. Normally-open tie lines set this to `false`.
    #[serde(default = "in_service_default")]
    pub in_service: bool,
}

fn in_service_default() -> bool {
    true
}

/// The external grid connection feeding the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Id,
    pub node: Id,
}

/// One entry of a transformer tap table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapSetting {
    pub position: i32,
    /// Voltage transformation ratio relative to nominal (1.0 = nominal).
    pub ratio: f64,
}

/// MV/LV transformer with a discrete tap changer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub id: Id,
    pub from_node: Id,
    pub to_node: Id,
    /// Tap position in use at load time.
    pub tap_pos: i32,
    pub taps: Vec<TapSetting>,
}

impl Transformer {
    /// Returns the ratio declared for `position`, if the position exists.
    pub fn ratio_at(&self, position: i32) -> Option<f64> {
        self.taps
            .iter()
            .find(|t| t.position == position)
            .map(|t| t.ratio)
    }

    /// Declared tap positions in ascending order.
    pub fn positions_ascending(&self) -> Vec<i32> {
        let mut positions: Vec<i32> = self.taps.iter().map(|t| t.position).collect();
        positions.sort_unstable();
        positions
    }
}

/// A symmetric (balanced three-phase) load whose power is driven by profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymLoad {
    pub id: Id,
    pub node: Id,
}

/// Raw element lists of one grid description, before validation.
///
/// Sources and transformers are lists so that "exactly one" can be checked
/// rather than assumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridInput {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub transformers: Vec<Transformer>,
    #[serde(default)]
    pub sym_loads: Vec<SymLoad>,
}
