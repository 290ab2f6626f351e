//! A cluster: one variable-height packed row inside a stripe.

use strata_circuit::{BlockId, Circuit, Orientation, WellInfo};

/// A packed row of cells sharing one P/N well pair.
///
/// The cluster's height is always the sum of the maximum p-well and
/// n-well heights over its members; `used_size` includes the width
/// reserved for a well-tap cell.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Whether the cluster is in N orientation (p-well at the bottom).
    pub orient_n: bool,
    /// Member blocks in x order, including inserted tap cells.
    pub blocks: Vec<BlockId>,
    /// The tap cells inserted into this cluster.
    pub tap_cells: Vec<BlockId>,
    /// Lower-left x coordinate.
    pub lx: i32,
    /// Lower-left y coordinate.
    pub ly: i32,
    /// Cluster width (the stripe width).
    pub width: i32,
    /// Cluster height: `p_well_height + n_well_height`.
    pub height: i32,
    /// Total member width plus the tap-cell reservation.
    pub used_size: i32,
    /// Maximum member p-well height.
    pub p_well_height: i32,
    /// Maximum member n-well height.
    pub n_well_height: i32,
}

impl Cluster {
    /// Creates an empty cluster at the given x with the given width.
    pub fn new(lx: i32, width: i32) -> Self {
        Self {
            orient_n: true,
            blocks: Vec::new(),
            tap_cells: Vec::new(),
            lx,
            ly: 0,
            width,
            height: 0,
            used_size: 0,
            p_well_height: 0,
            n_well_height: 0,
        }
    }

    /// Returns the upper-right x coordinate.
    pub fn urx(&self) -> i32 {
        self.lx + self.width
    }

    /// Returns the upper-right y coordinate.
    pub fn ury(&self) -> i32 {
        self.ly + self.height
    }

    /// Returns the center y coordinate.
    pub fn center_y(&self) -> f64 {
        f64::from(self.ly) + f64::from(self.height) / 2.0
    }

    /// Moves the cluster so its top edge sits at `uy`.
    pub fn set_ury(&mut self, uy: i32) {
        self.ly = uy - self.height;
    }

    /// Reserves `width` of the cluster's row.
    pub fn use_space(&mut self, width: i32) {
        self.used_size += width;
    }

    /// Grows the well heights with the bottom edge fixed.
    pub fn update_well_height_from_bottom(&mut self, p_height: i32, n_height: i32) {
        self.p_well_height = self.p_well_height.max(p_height);
        self.n_well_height = self.n_well_height.max(n_height);
        self.height = self.p_well_height + self.n_well_height;
    }

    /// Grows the well heights with the top edge fixed.
    pub fn update_well_height_from_top(&mut self, p_height: i32, n_height: i32) {
        let old_height = self.height;
        self.p_well_height = self.p_well_height.max(p_height);
        self.n_well_height = self.n_well_height.max(n_height);
        self.height = self.p_well_height + self.n_well_height;
        self.ly -= self.height - old_height;
    }

    /// Returns the y distance from the cluster bottom to the P/N edge.
    pub fn pn_edge(&self) -> i32 {
        if self.orient_n {
            self.p_well_height
        } else {
            self.n_well_height
        }
    }

    /// Aligns every member's y so its well edge meets the cluster's.
    pub fn update_block_loc_y(&self, ckt: &mut Circuit) {
        for &id in &self.blocks {
            let well = self.well_of(ckt, id);
            let lly = if self.orient_n {
                self.ly + self.p_well_height - well.p_height
            } else {
                self.ly + self.n_well_height - well.n_height
            };
            ckt.block_mut(id).lly = f64::from(lly);
        }
    }

    /// Packs members left to right from the cluster's left edge.
    pub fn legalize_compact_x(&mut self, ckt: &mut Circuit) {
        self.sort_blocks_by_llx(ckt);
        let mut contour = f64::from(self.lx);
        for &id in &self.blocks {
            let block = ckt.block_mut(id);
            block.llx = contour;
            contour += f64::from(block.width);
        }
    }

    /// Removes member overlaps with minimal displacement.
    ///
    /// Sweeps left to right pushing each block to its own position or the
    /// running contour, whichever is further right; if the result leaks
    /// past the right edge, a mirrored right-to-left sweep pulls the
    /// members back. Two sweeps suffice when the members fit.
    pub fn legalize_loose_x(&mut self, ckt: &mut Circuit) {
        if self.blocks.is_empty() {
            return;
        }
        self.sort_blocks_by_llx(ckt);
        let mut contour = f64::from(self.lx);
        for &id in &self.blocks {
            let block = ckt.block_mut(id);
            block.llx = contour.max(block.llx);
            contour = block.urx();
        }

        let right_edge = f64::from(self.urx());
        if contour > right_edge {
            self.blocks.sort_unstable_by(|&a, &b| {
                let ba = ckt.block(a).urx();
                let bb = ckt.block(b).urx();
                bb.partial_cmp(&ba)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(&b))
            });
            let mut contour = right_edge;
            for &id in &self.blocks {
                let block = ckt.block_mut(id);
                let urx = contour.min(block.urx());
                block.set_urx(urx);
                contour = block.llx;
            }
            self.sort_blocks_by_llx(ckt);
        }
    }

    /// Sets the cluster orientation, flipping members about the center.
    pub fn set_orient(&mut self, ckt: &mut Circuit, orient_n: bool) {
        if self.orient_n == orient_n {
            return;
        }
        self.orient_n = orient_n;
        let orient = if orient_n {
            Orientation::N
        } else {
            Orientation::FS
        };
        let flip_axis = self.center_y();
        for &id in &self.blocks {
            let block = ckt.block_mut(id);
            let lly_to_axis = flip_axis - block.lly;
            block.orient = orient;
            block.set_ury(flip_axis + lly_to_axis);
        }
    }

    /// Inserts a tap cell at the given x center and aligns its wells.
    pub fn insert_tap(&mut self, ckt: &mut Circuit, tap: BlockId, center_x: i32) {
        let well = self.well_of(ckt, tap);
        self.tap_cells.push(tap);
        self.blocks.push(tap);
        let block = ckt.block_mut(tap);
        block.set_center_x(f64::from(center_x));
        if self.orient_n {
            block.orient = Orientation::N;
            block.lly = f64::from(self.ly + self.p_well_height - well.p_height);
        } else {
            block.orient = Orientation::FS;
            block.lly = f64::from(self.ly + self.n_well_height - well.n_height);
        }
    }

    /// Shifts every member vertically by `disp`.
    pub fn shift_blocks_y(&self, ckt: &mut Circuit, disp: f64) {
        for &id in &self.blocks {
            ckt.block_mut(id).lly += disp;
        }
    }

    fn sort_blocks_by_llx(&mut self, ckt: &Circuit) {
        self.blocks.sort_unstable_by(|&a, &b| {
            let ba = ckt.block(a).llx;
            let bb = ckt.block(b).llx;
            ba.partial_cmp(&bb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
    }

    fn well_of(&self, ckt: &Circuit, id: BlockId) -> WellInfo {
        let block = ckt.block(id);
        ckt.block_type(block.type_id).well.unwrap_or(WellInfo {
            p_height: block.height,
            n_height: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_circuit::{BlockType, BlockTypeId, PlaceStatus, Tech};
    use strata_common::RectInt;

    fn well_type(width: i32, p: i32, n: i32) -> BlockType {
        BlockType {
            id: BlockTypeId::from_raw(0),
            name: "C".into(),
            width,
            height: p + n,
            pins: vec![],
            well: Some(WellInfo {
                p_height: p,
                n_height: n,
            }),
        }
    }

    fn circuit() -> Circuit {
        Circuit::new(RectInt::new(0, 0, 100, 100), Tech::default())
    }

    #[test]
    fn height_tracks_well_maxima() {
        let mut c = Cluster::new(0, 20);
        c.update_well_height_from_bottom(5, 5);
        assert_eq!(c.height, 10);
        c.update_well_height_from_bottom(6, 4);
        assert_eq!(c.p_well_height, 6);
        assert_eq!(c.n_well_height, 5);
        assert_eq!(c.height, 11);
    }

    #[test]
    fn growth_from_top_keeps_ury() {
        let mut c = Cluster::new(0, 20);
        c.update_well_height_from_top(5, 5);
        c.set_ury(50);
        assert_eq!(c.ly, 40);
        c.update_well_height_from_top(7, 5);
        assert_eq!(c.ury(), 50);
        assert_eq!(c.ly, 38);
    }

    #[test]
    fn pn_edge_follows_orientation() {
        let mut c = Cluster::new(0, 20);
        c.update_well_height_from_bottom(6, 4);
        assert_eq!(c.pn_edge(), 6);
        c.orient_n = false;
        assert_eq!(c.pn_edge(), 4);
    }

    #[test]
    fn loose_x_resolves_overlap() {
        let mut ckt = circuit();
        let ty = ckt.add_block_type(well_type(4, 5, 5));
        let a = ckt.add_block("a", ty, 2.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", ty, 3.0, 0.0, PlaceStatus::Placed);
        let mut c = Cluster::new(0, 20);
        c.blocks = vec![a, b];
        c.legalize_loose_x(&mut ckt);
        assert_eq!(ckt.block(a).llx, 2.0);
        assert_eq!(ckt.block(b).llx, 6.0);
    }

    #[test]
    fn loose_x_pulls_back_from_right_edge() {
        let mut ckt = circuit();
        let ty = ckt.add_block_type(well_type(4, 5, 5));
        let a = ckt.add_block("a", ty, 5.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", ty, 7.0, 0.0, PlaceStatus::Placed);
        let mut c = Cluster::new(0, 10);
        c.blocks = vec![a, b];
        c.legalize_loose_x(&mut ckt);
        // Both fit exactly against the right edge.
        assert_eq!(ckt.block(b).urx(), 10.0);
        assert_eq!(ckt.block(a).urx(), ckt.block(b).llx);
        assert!(ckt.block(a).llx >= 0.0);
    }

    #[test]
    fn compact_x_packs_from_left() {
        let mut ckt = circuit();
        let ty = ckt.add_block_type(well_type(3, 5, 5));
        let a = ckt.add_block("a", ty, 9.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", ty, 1.0, 0.0, PlaceStatus::Placed);
        let mut c = Cluster::new(0, 20);
        c.blocks = vec![a, b];
        c.legalize_compact_x(&mut ckt);
        assert_eq!(ckt.block(b).llx, 0.0);
        assert_eq!(ckt.block(a).llx, 3.0);
    }

    #[test]
    fn block_y_alignment_by_well_edge() {
        let mut ckt = circuit();
        let tall = ckt.add_block_type(well_type(3, 6, 4));
        let short = ckt.add_block_type(well_type(3, 5, 5));
        let a = ckt.add_block("a", tall, 0.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", short, 3.0, 0.0, PlaceStatus::Placed);
        let mut c = Cluster::new(0, 20);
        c.blocks = vec![a, b];
        c.update_well_height_from_bottom(6, 4);
        c.update_well_height_from_bottom(5, 5);
        c.ly = 10;
        c.update_block_loc_y(&mut ckt);
        // P/N edges meet at ly + p_well_height = 16.
        assert_eq!(ckt.block(a).lly, 10.0);
        assert_eq!(ckt.block(b).lly, 11.0);
        assert_eq!(ckt.block(a).lly + 6.0, 16.0);
        assert_eq!(ckt.block(b).lly + 5.0, 16.0);
    }

    #[test]
    fn orientation_flip_mirrors_about_center() {
        let mut ckt = circuit();
        let ty = ckt.add_block_type(well_type(3, 6, 4));
        let a = ckt.add_block("a", ty, 0.0, 10.0, PlaceStatus::Placed);
        let mut c = Cluster::new(0, 20);
        c.blocks = vec![a];
        c.update_well_height_from_bottom(6, 4);
        c.ly = 10;
        c.set_orient(&mut ckt, false);
        assert_eq!(ckt.block(a).orient, Orientation::FS);
        // Flipping about y = 15 maps [10, 20] onto itself.
        assert_eq!(ckt.block(a).lly, 10.0);
        // Flipping back restores N.
        c.set_orient(&mut ckt, true);
        assert_eq!(ckt.block(a).orient, Orientation::N);
    }

    #[test]
    fn tap_insertion_aligns_wells() {
        let mut ckt = circuit();
        let ty = ckt.add_block_type(well_type(4, 6, 4));
        let tap_ty = ckt.add_block_type(well_type(2, 5, 3));
        let a = ckt.add_block("a", ty, 0.0, 0.0, PlaceStatus::Placed);
        let tap = ckt.add_well_tap("__well_tap__0", tap_ty);
        let mut c = Cluster::new(0, 20);
        c.blocks = vec![a];
        c.update_well_height_from_bottom(6, 4);
        c.ly = 0;
        c.insert_tap(&mut ckt, tap, 10);
        assert_eq!(c.tap_cells.len(), 1);
        assert_eq!(c.blocks.len(), 2);
        // Tap p-well edge meets the cluster p-well edge at y = 6.
        assert_eq!(ckt.block(tap).lly, 1.0);
        assert_eq!(ckt.block(tap).x(), 10.0);
    }
}
