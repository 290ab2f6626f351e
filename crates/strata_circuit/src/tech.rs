//! Technology parameters: well rules, row geometry, output scale factors.

use crate::ids::BlockTypeId;
use serde::{Deserialize, Serialize};

/// Well design rules and manufacturing scale factors.
///
/// Distances are in grid units unless noted. The DEF factors convert
/// grid coordinates into manufacturing-grid integers when well shapes
/// are emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tech {
    /// Minimum spacing between wells of the same polarity.
    pub same_well_spacing: i32,
    /// Minimum spacing between wells of opposite polarity.
    pub opposite_well_spacing: i32,
    /// Maximum distance from any point in a well to a well tap.
    pub max_plug_distance: i32,
    /// Well overhang beyond the cell boundary.
    pub overhang: i32,
    /// Site row height.
    pub row_height: i32,
    /// The well-tap cell type, required for legalization.
    pub well_tap_type: Option<BlockTypeId>,
    /// Microns per grid unit along x.
    pub grid_value_x: f64,
    /// Microns per grid unit along y.
    pub grid_value_y: f64,
    /// DEF `UNITS DISTANCE MICRONS` factor.
    pub def_distance_microns: i32,
    /// Die-area offset along x applied to emitted shapes.
    pub die_area_offset_x: i32,
    /// Die-area offset along y applied to emitted shapes.
    pub die_area_offset_y: i32,
}

impl Tech {
    /// Returns the governing well spacing (the larger of the two rules).
    pub fn well_spacing(&self) -> i32 {
        self.same_well_spacing.max(self.opposite_well_spacing)
    }

    /// Returns the x scale factor from grid units to manufacturing integers.
    pub fn factor_x(&self) -> f64 {
        f64::from(self.def_distance_microns) * self.grid_value_x
    }

    /// Returns the y scale factor from grid units to manufacturing integers.
    pub fn factor_y(&self) -> f64 {
        f64::from(self.def_distance_microns) * self.grid_value_y
    }
}

impl Default for Tech {
    fn default() -> Self {
        Self {
            same_well_spacing: 0,
            opposite_well_spacing: 0,
            max_plug_distance: 0,
            overhang: 0,
            row_height: 1,
            well_tap_type: None,
            grid_value_x: 1.0,
            grid_value_y: 1.0,
            def_distance_microns: 1,
            die_area_offset_x: 0,
            die_area_offset_y: 0,
        }
    }
}
