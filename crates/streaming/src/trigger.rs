use foundation::{GeohashError, TileId};

use crate::direction::Direction;
use crate::node::Node;

/// A discovery request: the tile the viewer is in and where it is looking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileTrigger {
    pub tile: TileId,
    pub direction: Direction,
}

/// Latest-value join of the position and bearing streams.
///
/// Consecutive bearings mapping to the same direction are collapsed before
/// joining. Positions are not collapsed: every node emits a trigger once a
/// direction is known, even if it lies in the same tile as the previous one.
#[derive(Debug, Clone)]
pub struct TriggerState {
    precision: usize,
    direction: Option<Direction>,
    tile: Option<TileId>,
}

impl TriggerState {
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            direction: None,
            tile: None,
        }
    }

    pub fn on_bearing(&mut self, bearing: f64) -> Option<TileTrigger> {
        let direction = Direction::from_bearing(bearing);
        if self.direction == Some(direction) {
            return None;
        }
        self.direction = Some(direction);
        self.current()
    }

    /// A node that cannot be tiled leaves the previous position in place.
    pub fn on_node(&mut self, node: &Node) -> Result<Option<TileTrigger>, GeohashError> {
        self.tile = Some(node.tile(self.precision)?);
        Ok(self.current())
    }

    fn current(&self) -> Option<TileTrigger> {
        Some(TileTrigger {
            tile: self.tile.clone()?,
            direction: self.direction?,
        })
    }
}
