//! Column stripes: the unit of cluster legalization.
//!
//! The die is divided into columns of roughly `stripe_width_factor ×
//! max_plug_distance`. Each column is further decomposed into simple
//! stripes: maximal runs of rows sharing an identical usable x-interval,
//! so fixed obstacles split a column into separate stripes above, below,
//! and beside them.

use crate::config::PlacementOptions;
use crate::well::cluster::Cluster;
use strata_circuit::{BlockId, Circuit};
use strata_common::{merge_segments, SegmentInt};

/// A vertical slab of the die holding a stack of clusters.
#[derive(Debug, Clone)]
pub struct Stripe {
    /// Left edge.
    pub lx: i32,
    /// Usable width (the well spacing is already subtracted).
    pub width: i32,
    /// Bottom edge.
    pub ly: i32,
    /// Top edge.
    pub uy: i32,
    /// Current packing frontier.
    pub contour: i32,
    /// Total height of the packed clusters.
    pub used_height: i32,
    /// Upper bound on members per cluster, for reservation.
    pub max_blk_capacity_per_cluster: usize,
    /// The packed clusters, in packing order.
    pub clusters: Vec<Cluster>,
    /// Movable blocks assigned to this stripe.
    pub blocks: Vec<BlockId>,
    /// Whether the last successful packing ran bottom-up.
    pub is_bottom_up: bool,
    /// Orientation of the first (bottom) row.
    pub first_row_orient_n: bool,
}

impl Stripe {
    /// Returns the right edge.
    pub fn urx(&self) -> i32 {
        self.lx + self.width
    }

    /// Returns the stripe height.
    pub fn height(&self) -> i32 {
        self.uy - self.ly
    }
}

/// The stripe decomposition of the die.
#[derive(Debug)]
pub struct StripePlan {
    /// All stripes, ordered by column then bottom row.
    pub stripes: Vec<Stripe>,
    /// Per-row white-space segments over the whole die.
    pub white_space_in_rows: Vec<Vec<SegmentInt>>,
    /// Site row height.
    pub row_height: i32,
    /// Number of rows.
    pub tot_rows: usize,
    /// Column width before stripe decomposition.
    pub col_width: i32,
    /// Number of columns.
    pub col_count: usize,
}

/// Computes per-row white space by subtracting fixed-block spans.
///
/// Rows shorter than the minimum movable block width are dropped.
pub fn detect_row_white_space(ckt: &Circuit) -> Vec<Vec<SegmentInt>> {
    let row_height = ckt.tech.row_height;
    let tot_rows = (ckt.region_height() / row_height).max(1) as usize;
    let min_width = ckt.min_movable_width();

    let mut occupied: Vec<Vec<SegmentInt>> = vec![Vec::new(); tot_rows];
    for block in ckt.blocks.iter().filter(|b| b.is_fixed()) {
        let lx = block.llx.floor() as i32;
        let ux = block.urx().ceil() as i32;
        let ly = block.lly.floor() as i32;
        let uy = block.ury().ceil() as i32;
        if ly >= ckt.top() || uy <= ckt.bottom() || lx >= ckt.right() || ux <= ckt.left() {
            continue;
        }
        let start_row = ((ly - ckt.bottom()) / row_height).max(0) as usize;
        let end_row = (((uy - ckt.bottom() - 1) / row_height).max(0) as usize).min(tot_rows - 1);
        let span = SegmentInt::new(lx.max(ckt.left()), ux.min(ckt.right()));
        if span.is_empty() {
            continue;
        }
        for row in occupied.iter_mut().take(end_row + 1).skip(start_row) {
            row.push(span);
        }
    }

    let mut white = Vec::with_capacity(tot_rows);
    for mut row in occupied {
        merge_segments(&mut row);
        let mut free = Vec::with_capacity(row.len() + 1);
        let mut cursor = ckt.left();
        for seg in &row {
            if seg.lo > cursor {
                free.push(SegmentInt::new(cursor, seg.lo));
            }
            cursor = cursor.max(seg.hi);
        }
        if cursor < ckt.right() {
            free.push(SegmentInt::new(cursor, ckt.right()));
        }
        free.retain(|s| s.len() >= min_width);
        white.push(free);
    }
    white
}

/// Builds the stripe decomposition for the circuit.
pub fn build_stripes(ckt: &Circuit, opts: &PlacementOptions) -> StripePlan {
    let white_space_in_rows = detect_row_white_space(ckt);
    let row_height = ckt.tech.row_height;
    let tot_rows = white_space_in_rows.len();
    let region_width = ckt.region_width();

    let target = (opts.stripe_width_factor * f64::from(ckt.tech.max_plug_distance)).round() as i32;
    let col_width = target.clamp(1, region_width);
    let col_count = ((region_width + col_width - 1) / col_width).max(1) as usize;
    let col_width = region_width / col_count as i32;

    let well_spacing = ckt.tech.well_spacing();
    let min_width = ckt.min_movable_width();

    let mut stripes = Vec::new();
    for col in 0..col_count {
        let col_lo = ckt.left() + col as i32 * col_width;
        let col_hi = if col + 1 == col_count {
            ckt.right()
        } else {
            col_lo + col_width
        };
        let col_span = SegmentInt::new(col_lo, col_hi);

        // Open runs of identical usable intervals, scanned bottom-up.
        let mut open: Vec<(SegmentInt, usize)> = Vec::new();
        for row in 0..=tot_rows {
            let here: Vec<SegmentInt> = if row < tot_rows {
                white_space_in_rows[row]
                    .iter()
                    .filter_map(|s| s.intersect(&col_span))
                    .filter(|s| s.len() >= min_width)
                    .collect()
            } else {
                Vec::new()
            };

            let mut still_open = Vec::new();
            for (seg, start_row) in open.drain(..) {
                if here.contains(&seg) {
                    still_open.push((seg, start_row));
                } else {
                    push_stripe(
                        &mut stripes,
                        ckt,
                        opts,
                        seg,
                        start_row,
                        row,
                        row_height,
                        well_spacing,
                    );
                }
            }
            for seg in here {
                if !still_open.iter().any(|(s, _)| *s == seg) {
                    still_open.push((seg, row));
                }
            }
            open = still_open;
        }
    }

    StripePlan {
        stripes,
        white_space_in_rows,
        row_height,
        tot_rows,
        col_width,
        col_count,
    }
}

#[allow(clippy::too_many_arguments)]
fn push_stripe(
    stripes: &mut Vec<Stripe>,
    ckt: &Circuit,
    opts: &PlacementOptions,
    seg: SegmentInt,
    start_row: usize,
    end_row: usize,
    row_height: i32,
    well_spacing: i32,
) {
    let width = seg.len() - well_spacing;
    if width < ckt.min_movable_width() {
        return;
    }
    let ly = ckt.bottom() + start_row as i32 * row_height;
    let uy = ckt.bottom() + end_row as i32 * row_height;
    let capacity = (width / ckt.min_movable_width()).max(1) as usize;
    stripes.push(Stripe {
        lx: seg.lo,
        width,
        ly,
        uy,
        contour: ly,
        used_height: 0,
        max_blk_capacity_per_cluster: capacity,
        clusters: Vec::new(),
        blocks: Vec::new(),
        is_bottom_up: true,
        first_row_orient_n: opts.first_row_orient_n,
    });
}

/// Assigns every movable block to the nearest stripe.
///
/// Distance is the Manhattan gap from the block center to the stripe
/// rectangle; ties keep the earliest stripe for determinism.
pub fn assign_blocks(plan: &mut StripePlan, ckt: &Circuit) {
    for stripe in plan.stripes.iter_mut() {
        stripe.blocks.clear();
    }
    for block in ckt.blocks.iter().filter(|b| b.is_movable()) {
        let x = block.x();
        let y = block.y();
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (i, stripe) in plan.stripes.iter().enumerate() {
            let dx = (f64::from(stripe.lx) - x).max(x - f64::from(stripe.urx())).max(0.0);
            let dy = (f64::from(stripe.ly) - y).max(y - f64::from(stripe.uy)).max(0.0);
            let dist = dx + dy;
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        if best_dist.is_finite() {
            plan.stripes[best].blocks.push(block.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_circuit::{BlockType, BlockTypeId, PlaceStatus, Tech, WellInfo};
    use strata_common::RectInt;

    fn cell_type(width: i32, height: i32) -> BlockType {
        BlockType {
            id: BlockTypeId::from_raw(0),
            name: "C".into(),
            width,
            height,
            pins: vec![],
            well: Some(WellInfo {
                p_height: height / 2,
                n_height: height - height / 2,
            }),
        }
    }

    fn tech(max_plug: i32, row_height: i32) -> Tech {
        Tech {
            max_plug_distance: max_plug,
            row_height,
            ..Tech::default()
        }
    }

    #[test]
    fn open_region_gives_full_rows() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 30, 30), tech(30, 10));
        let ty = ckt.add_block_type(cell_type(2, 10));
        ckt.add_block("m", ty, 0.0, 0.0, PlaceStatus::Unplaced);
        let rows = detect_row_white_space(&ckt);
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row, vec![SegmentInt::new(0, 30)]);
        }
    }

    #[test]
    fn fixed_block_splits_rows() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 30, 30), tech(30, 10));
        let ty = ckt.add_block_type(cell_type(2, 10));
        let ob = ckt.add_block_type(cell_type(10, 10));
        ckt.add_block("m", ty, 0.0, 0.0, PlaceStatus::Unplaced);
        ckt.add_block("obst", ob, 10.0, 10.0, PlaceStatus::Fixed);
        let rows = detect_row_white_space(&ckt);
        assert_eq!(rows[0], vec![SegmentInt::new(0, 30)]);
        assert_eq!(
            rows[1],
            vec![SegmentInt::new(0, 10), SegmentInt::new(20, 30)]
        );
        assert_eq!(rows[2], vec![SegmentInt::new(0, 30)]);
    }

    #[test]
    fn obstacle_produces_multiple_stripes() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 30, 30), tech(30, 10));
        let ty = ckt.add_block_type(cell_type(2, 10));
        let ob = ckt.add_block_type(cell_type(10, 10));
        ckt.add_block("m", ty, 0.0, 0.0, PlaceStatus::Unplaced);
        ckt.add_block("obst", ob, 10.0, 10.0, PlaceStatus::Fixed);
        let opts = PlacementOptions::default();
        let plan = build_stripes(&ckt, &opts);
        // Full-width column decomposes around the obstacle: below, left,
        // right, above.
        assert!(plan.stripes.len() >= 3, "got {}", plan.stripes.len());
        // No stripe overlaps the obstacle.
        for s in &plan.stripes {
            let overlap_x = s.lx < 20 && s.urx() > 10;
            let overlap_y = s.ly < 20 && s.uy > 10;
            assert!(!(overlap_x && overlap_y), "stripe overlaps obstacle");
        }
    }

    #[test]
    fn narrow_region_is_one_column() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 10, 20), tech(40, 2));
        let ty = ckt.add_block_type(cell_type(2, 2));
        ckt.add_block("m", ty, 0.0, 0.0, PlaceStatus::Unplaced);
        let opts = PlacementOptions::default();
        let plan = build_stripes(&ckt, &opts);
        assert_eq!(plan.col_count, 1);
        assert_eq!(plan.stripes.len(), 1);
        assert_eq!(plan.stripes[0].width, 10);
    }

    #[test]
    fn wide_region_gets_multiple_columns() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 100, 20), tech(10, 2));
        let ty = ckt.add_block_type(cell_type(2, 2));
        ckt.add_block("m", ty, 0.0, 0.0, PlaceStatus::Unplaced);
        let opts = PlacementOptions::default();
        // Column target = 2.0 × 10 = 20 → five columns.
        let plan = build_stripes(&ckt, &opts);
        assert_eq!(plan.col_count, 5);
        assert_eq!(plan.stripes.len(), 5);
    }

    #[test]
    fn blocks_assigned_to_containing_stripe() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 100, 20), tech(10, 2));
        let ty = ckt.add_block_type(cell_type(2, 2));
        let a = ckt.add_block("a", ty, 5.0, 5.0, PlaceStatus::Unplaced);
        let b = ckt.add_block("b", ty, 90.0, 5.0, PlaceStatus::Unplaced);
        let opts = PlacementOptions::default();
        let mut plan = build_stripes(&ckt, &opts);
        assign_blocks(&mut plan, &ckt);
        let holder_of = |id| {
            plan.stripes
                .iter()
                .position(|s| s.blocks.contains(&id))
                .unwrap()
        };
        assert_ne!(holder_of(a), holder_of(b));
        let total: usize = plan.stripes.iter().map(|s| s.blocks.len()).sum();
        assert_eq!(total, 2);
    }
}
