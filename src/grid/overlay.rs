//! Copy-on-write scenario overlays over a shared base grid.

use super::model::Grid;
use super::types::{Id, Line};
use crate::error::TopologyError;

/// Small per-scenario delta: line status overrides and an optional tap position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioPatch {
    /// `(line position, in_service)`; at most one entry per line.
    line_status: Vec<(usize, bool)>,
    tap_pos: Option<i32>,
}

impl ScenarioPatch {
    /// Returns `true` when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.line_status.is_empty() && self.tap_pos.is_none()
    }
}

/// A grid as seen by one scenario: the immutable base plus a patch.
///
/// Building a variant never copies element lists; many variants can share
/// one base across threads.
#[derive(Debug, Clone)]
pub struct GridVariant<'g> {
    base: &'g Grid,
    patch: ScenarioPatch,
}

impl<'g> GridVariant<'g> {
    /// The unmodified base grid.
    pub fn base(grid: &'g Grid) -> Self {
        Self {
            base: grid,
            patch: ScenarioPatch::default(),
        }
    }

    /// Overrides the in-service status of one line.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLine` if `line` is not a line of the base grid.
    pub fn with_line_status(mut self, line: Id, in_service: bool) -> Result<Self, TopologyError> {
        let pos = self
            .base
            .line_position(line)
            .ok_or(TopologyError::UnknownLine { id: line })?;
        self.patch.line_status.retain(|(p, _)| *p != pos);
        if self.base.lines()[pos].in_service != in_service {
            self.patch.line_status.push((pos, in_service));
        }
        Ok(self)
    }

    /// Moves the transformer to another declared tap position.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTapPosition` if the transformer does not declare `position`.
    pub fn with_tap(mut self, position: i32) -> Result<Self, TopologyError> {
        let transformer = self.base.transformer();
        if transformer.ratio_at(position).is_none() {
            return Err(TopologyError::UnknownTapPosition {
                id: transformer.id,
                position,
            });
        }
        self.patch.tap_pos = (position != transformer.tap_pos).then_some(position);
        Ok(self)
    }

    pub fn grid(&self) -> &'g Grid {
        self.base
    }

    pub fn patch(&self) -> &ScenarioPatch {
        &self.patch
    }

    pub(crate) fn line_status_at(&self, pos: usize) -> bool {
        self.patch
            .line_status
            .iter()
            .find(|(p, _)| *p == pos)
            .map_or(self.base.lines()[pos].in_service, |(_, s)| *s)
    }

    /// In-service status of `line` under this scenario, `None` for unknown ids.
    pub fn line_in_service(&self, line: Id) -> Option<bool> {
        self.base
            .line_position(line)
            .map(|pos| self.line_status_at(pos))
    }

    /// Lines that are closed in this scenario, in declaration order.
    pub fn in_service_lines(&self) -> impl Iterator<Item = &'g Line> + '_ {
        self.base
            .lines()
            .iter()
            .enumerate()
            .filter(|(pos, _)| self.line_status_at(*pos))
            .map(|(_, line)| line)
    }

    pub fn tap_pos(&self) -> i32 {
        self.patch
            .tap_pos
            .unwrap_or(self.base.transformer().tap_pos)
    }

    /// Ratio of the active tap position.
    pub fn tap_ratio(&self) -> f64 {
        let transformer = self.base.transformer();
        // Positions are checked on build and in `with_tap`.
        transformer.ratio_at(self.tap_pos()).unwrap_or(1.0)
    }

    /// Re-runs cycle and connectivity checks with the patched line statuses.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` or `NotConnected`.
    pub fn validate(&self) -> Result<(), TopologyError> {
        self.base.validate_with(&|pos| self.line_status_at(pos))
    }
}
