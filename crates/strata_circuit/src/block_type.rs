//! Library cell types: geometry, pin offsets, well descriptors.

use crate::ids::BlockTypeId;
use serde::{Deserialize, Serialize};

/// A pin location relative to the lower-left corner of its cell type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinOffset {
    /// Pin name (e.g., "A", "Z").
    pub name: String,
    /// Offset from the cell's lower-left x, in grid units.
    pub dx: f64,
    /// Offset from the cell's lower-left y, in grid units.
    pub dy: f64,
}

/// N/P-well heights for a cell type, in grid units.
///
/// The p-well occupies the bottom `p_height` of the cell in N
/// orientation, the n-well the top `n_height`. Their sum is the cell's
/// well height, which may exceed the drawn cell height by the overhang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellInfo {
    /// Height of the p-well region.
    pub p_height: i32,
    /// Height of the n-well region.
    pub n_height: i32,
}

impl WellInfo {
    /// Returns the total well height.
    pub fn height(&self) -> i32 {
        self.p_height + self.n_height
    }
}

/// A library cell: the shared geometry of all block instances of a type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockType {
    /// The unique ID of this type.
    pub id: BlockTypeId,
    /// Library cell name (e.g., "NAND2X1", "WELLTAPX1").
    pub name: String,
    /// Cell width in grid units.
    pub width: i32,
    /// Cell height in grid units.
    pub height: i32,
    /// Pin locations relative to the lower-left corner.
    pub pins: Vec<PinOffset>,
    /// Well descriptor (`None` for cells without well geometry).
    pub well: Option<WellInfo>,
}

impl BlockType {
    /// Returns the cell area as a wide integer.
    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}
