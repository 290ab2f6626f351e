//! Block instances and their placement state.

use crate::ids::{BlockId, BlockTypeId, NetId};
use serde::{Deserialize, Serialize};
use strata_common::Rect;

/// Placement status of a block.
///
/// `Unplaced` and `Placed` blocks are movable; `Fixed` and `Cover`
/// blocks are obstacles the placer must route around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceStatus {
    /// No meaningful coordinates yet.
    Unplaced,
    /// Placed by the engine; may still be moved.
    Placed,
    /// Pinned by the user; never moved.
    Fixed,
    /// A covered obstruction (e.g., a pre-routed macro); never moved.
    Cover,
}

/// Orientation of a block.
///
/// The row legalizer only produces `N` (north) and `FS` (flipped south),
/// the two orientations compatible with alternating well abutment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Upright.
    N,
    /// Flipped about the x axis.
    FS,
}

/// A cell instance with mutable coordinates.
///
/// Coordinates are the lower-left corner in grid units, kept as `f64`
/// because global placement works on continuous positions; legalization
/// snaps them back onto the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// The unique ID of this block.
    pub id: BlockId,
    /// Instance name.
    pub name: String,
    /// The library type of this block.
    pub type_id: BlockTypeId,
    /// Lower-left x coordinate.
    pub llx: f64,
    /// Lower-left y coordinate.
    pub lly: f64,
    /// Cell width, cached from the type.
    pub width: i32,
    /// Effective height; usually the type height, may be overridden.
    pub height: i32,
    /// Placement status.
    pub status: PlaceStatus,
    /// Orientation.
    pub orient: Orientation,
    /// Indices of nets this block participates in.
    pub nets: Vec<NetId>,
}

impl Block {
    /// Returns the upper-right x coordinate.
    pub fn urx(&self) -> f64 {
        self.llx + f64::from(self.width)
    }

    /// Returns the upper-right y coordinate.
    pub fn ury(&self) -> f64 {
        self.lly + f64::from(self.height)
    }

    /// Returns the center x coordinate.
    pub fn x(&self) -> f64 {
        self.llx + f64::from(self.width) / 2.0
    }

    /// Returns the center y coordinate.
    pub fn y(&self) -> f64 {
        self.lly + f64::from(self.height) / 2.0
    }

    /// Sets the upper-right x coordinate.
    pub fn set_urx(&mut self, urx: f64) {
        self.llx = urx - f64::from(self.width);
    }

    /// Sets the upper-right y coordinate.
    pub fn set_ury(&mut self, ury: f64) {
        self.lly = ury - f64::from(self.height);
    }

    /// Sets the center x coordinate.
    pub fn set_center_x(&mut self, x: f64) {
        self.llx = x - f64::from(self.width) / 2.0;
    }

    /// Sets the center y coordinate.
    pub fn set_center_y(&mut self, y: f64) {
        self.lly = y - f64::from(self.height) / 2.0;
    }

    /// Returns whether this block may be moved by the placer.
    pub fn is_movable(&self) -> bool {
        matches!(self.status, PlaceStatus::Unplaced | PlaceStatus::Placed)
    }

    /// Returns whether this block is an immovable obstacle.
    pub fn is_fixed(&self) -> bool {
        !self.is_movable()
    }

    /// Returns the block area as a wide integer.
    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }

    /// Returns the block footprint as a rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(self.llx, self.lly, self.urx(), self.ury())
    }

    /// Returns whether this block overlaps `other` with positive area.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.rect().overlaps(&other.rect())
    }
}
