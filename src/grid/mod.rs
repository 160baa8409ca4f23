//! Grid topology: element types, validation, scenario overlays, and
//! contingency search.

/// Alternative-line search for single-line outages.
pub mod contingency;
/// LV feeder metadata.
pub mod metadata;
pub mod model;
/// Copy-on-write scenario overlays.
pub mod overlay;
pub mod types;

pub use contingency::{alternatives_for, downstream_nodes};
pub use metadata::{Metadata, loads_by_feeder, validate_metadata};
pub use model::{Grid, validate_grid};
pub use overlay::{GridVariant, ScenarioPatch};
pub use types::{GridInput, Id, Line, Node, Source, SymLoad, TapSetting, Transformer};
