//! Recursive bisection spreading for look-ahead legalization.
//!
//! Each over-filled cluster gets a minimum bounding window whose white
//! space can absorb its cell area at the target filling rate. The window
//! is then split recursively, cell area flowing to each side in
//! proportion to its white space, until boxes are small enough to place
//! their cells directly by even spreading along the longer axis.

use crate::global::grid::{BinCluster, BinWindow, GridMesh};
use std::collections::VecDeque;
use strata_circuit::{BlockId, Circuit};

/// A cluster whose minimum bounding box reached the die bounds without
/// finding enough white space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadFailure;

/// A rectangular region under recursive bisection.
#[derive(Debug, Clone)]
pub struct BoxBin {
    /// The bin window covered by this box.
    pub window: BinWindow,
    /// The cells this box is responsible for.
    pub cells: Vec<BlockId>,
    /// Total cell area of the members.
    pub cell_area: f64,
}

/// Spreads one over-filled cluster.
///
/// Returns [`SpreadFailure`] when no bounding window inside the die can
/// hold the cluster's cell area at `filling_rate`.
pub fn spread_cluster(
    ckt: &mut Circuit,
    mesh: &GridMesh,
    cluster: &BinCluster,
    filling_rate: f64,
    cell_threshold: usize,
) -> Result<(), SpreadFailure> {
    let window = find_minimum_window(mesh, cluster, filling_rate)?;

    let mut cells = Vec::new();
    let mut cell_area = 0.0;
    for i in window.lx..=window.ux {
        for j in window.ly..=window.uy {
            let bin = &mesh.bins[i][j];
            cells.extend_from_slice(&bin.cells);
            cell_area += bin.cell_area;
        }
    }
    if cells.is_empty() {
        return Ok(());
    }

    let mut queue = VecDeque::new();
    queue.push_back(BoxBin {
        window,
        cells,
        cell_area,
    });

    while let Some(bx) = queue.pop_front() {
        if bx.cells.is_empty() {
            continue;
        }
        // An all-terminal box has nowhere to put cells; its members keep
        // their current coordinates.
        if mesh.white_space_in(&bx.window) <= 0.0 {
            continue;
        }
        let single_bin = bx.window.span_x() == 1 && bx.window.span_y() == 1;
        if single_bin || bx.cells.len() <= cell_threshold {
            place_in_box(ckt, mesh, &bx);
            continue;
        }
        let (low, high) = split_box(ckt, mesh, bx);
        queue.push_back(low);
        queue.push_back(high);
    }
    Ok(())
}

/// Grows the cluster's window one ring at a time until its white space
/// can absorb its cell area at `filling_rate`.
fn find_minimum_window(
    mesh: &GridMesh,
    cluster: &BinCluster,
    filling_rate: f64,
) -> Result<BinWindow, SpreadFailure> {
    let full = mesh.full_window();
    let mut w = cluster.window;
    loop {
        let capacity = mesh.white_space_in(&w) * filling_rate;
        if mesh.cell_area_in(&w) <= capacity {
            return Ok(w);
        }
        if w == full {
            return Err(SpreadFailure);
        }
        w = BinWindow {
            lx: w.lx.saturating_sub(1),
            ly: w.ly.saturating_sub(1),
            ux: (w.ux + 1).min(full.ux),
            uy: (w.uy + 1).min(full.uy),
        };
    }
}

/// Splits a box along its longer side, sending cell area to each child
/// in proportion to the child's white space.
fn split_box(ckt: &Circuit, mesh: &GridMesh, mut bx: BoxBin) -> (BoxBin, BoxBin) {
    let rect = mesh.window_rect(&bx.window);
    let mut cut_x = rect.width() >= rect.height();
    // The cut needs at least two bins across; flip the axis if the
    // preferred one cannot be split.
    if cut_x && bx.window.span_x() < 2 {
        cut_x = false;
    }
    if !cut_x && bx.window.span_y() < 2 {
        cut_x = true;
    }

    let total_white = mesh.white_space_in(&bx.window);
    let (low_window, high_window) = if cut_x {
        let cut = best_cut(bx.window.lx, bx.window.ux, total_white, |c| {
            mesh.white_space_in(&BinWindow {
                ux: c,
                ..bx.window
            })
        });
        (
            BinWindow {
                ux: cut,
                ..bx.window
            },
            BinWindow {
                lx: cut + 1,
                ..bx.window
            },
        )
    } else {
        let cut = best_cut(bx.window.ly, bx.window.uy, total_white, |c| {
            mesh.white_space_in(&BinWindow {
                uy: c,
                ..bx.window
            })
        });
        (
            BinWindow {
                uy: cut,
                ..bx.window
            },
            BinWindow {
                ly: cut + 1,
                ..bx.window
            },
        )
    };

    let low_white = mesh.white_space_in(&low_window);
    let share = if total_white > 0.0 {
        low_white / total_white
    } else {
        0.5
    };
    let target_low = bx.cell_area * share;

    bx.cells.sort_unstable_by(|&a, &b| {
        let ba = ckt.block(a);
        let bb = ckt.block(b);
        let (ca, cb) = if cut_x {
            (ba.x(), bb.x())
        } else {
            (ba.y(), bb.y())
        };
        ca.partial_cmp(&cb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    let mut low_cells = Vec::new();
    let mut high_cells = Vec::new();
    let mut low_area = 0.0;
    let mut high_area = 0.0;
    for id in bx.cells {
        let area = ckt.block(id).area() as f64;
        if low_area + area <= target_low || (target_low > 0.0 && low_cells.is_empty()) {
            low_area += area;
            low_cells.push(id);
        } else {
            high_area += area;
            high_cells.push(id);
        }
    }

    (
        BoxBin {
            window: low_window,
            cells: low_cells,
            cell_area: low_area,
        },
        BoxBin {
            window: high_window,
            cells: high_cells,
            cell_area: high_area,
        },
    )
}

/// Picks the cut index in `[lo, hi)` whose low side holds the white
/// space closest to half of `total`.
fn best_cut(lo: usize, hi: usize, total: f64, low_white: impl Fn(usize) -> f64) -> usize {
    let mut best = lo;
    let mut best_gap = f64::INFINITY;
    for c in lo..hi {
        let gap = (low_white(c) - total / 2.0).abs();
        if gap < best_gap {
            best_gap = gap;
            best = c;
        }
    }
    best
}

/// Distributes a box's cells evenly along the box's longer axis.
///
/// Cells are ordered by their current coordinate (ties by block index)
/// so relative order is preserved; the shorter-axis coordinate is
/// clamped into the box.
pub fn place_in_box(ckt: &mut Circuit, mesh: &GridMesh, bx: &BoxBin) {
    let rect = mesh.window_rect(&bx.window);
    let horizontal = rect.width() >= rect.height();

    let mut order = bx.cells.clone();
    order.sort_unstable_by(|&a, &b| {
        let ba = ckt.block(a);
        let bb = ckt.block(b);
        let (ca, cb) = if horizontal {
            (ba.x(), bb.x())
        } else {
            (ba.y(), bb.y())
        };
        ca.partial_cmp(&cb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    let n = order.len() as f64;
    for (k, id) in order.iter().enumerate() {
        let block = ckt.block_mut(*id);
        if horizontal {
            let step = rect.width() / n;
            block.set_center_x(rect.llx + (k as f64 + 0.5) * step);
            let hi = (rect.ury - f64::from(block.height)).max(rect.lly);
            block.lly = block.lly.clamp(rect.lly, hi);
        } else {
            let step = rect.height() / n;
            block.set_center_y(rect.lly + (k as f64 + 0.5) * step);
            let hi = (rect.urx - f64::from(block.width)).max(rect.llx);
            block.llx = block.llx.clamp(rect.llx, hi);
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
                p_height: 1,
                n_height: 1,
            }),
        }
    }

    fn clumped_circuit() -> Circuit {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 40, 40), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        for i in 0..16 {
            ckt.add_block(format!("m{i}"), ty, 1.0, 1.0, PlaceStatus::Unplaced);
        }
        ckt
    }

    #[test]
    fn spreading_separates_a_clump() {
        let mut ckt = clumped_circuit();
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.5);
        let clusters = mesh.find_overfill_clusters();
        assert!(!clusters.is_empty());
        spread_cluster(&mut ckt, &mesh, &clusters[0], 0.5, 2).unwrap();

        // After spreading, the cells no longer share one point.
        let xs: std::collections::BTreeSet<i64> = ckt
            .blocks
            .iter()
            .map(|b| (b.x() * 100.0).round() as i64)
            .collect();
        let ys: std::collections::BTreeSet<i64> = ckt
            .blocks
            .iter()
            .map(|b| (b.y() * 100.0).round() as i64)
            .collect();
        assert!(xs.len() > 1 || ys.len() > 1);

        // Everything stays inside the region.
        for b in &ckt.blocks {
            assert!(b.llx >= 0.0 && b.urx() <= 40.0);
            assert!(b.lly >= 0.0 && b.ury() <= 40.0);
        }
    }

    #[test]
    fn impossible_density_fails() {
        // A region that cannot hold its cells at the target rate.
        let mut ckt = Circuit::new(RectInt::new(0, 0, 8, 8), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        for i in 0..15 {
            ckt.add_block(format!("m{i}"), ty, 1.0, 1.0, PlaceStatus::Unplaced);
        }
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.5);
        let clusters = mesh.find_overfill_clusters();
        assert!(!clusters.is_empty());
        let result = spread_cluster(&mut ckt, &mesh, &clusters[0], 0.5, 2);
        assert_eq!(result, Err(SpreadFailure));
    }

    #[test]
    fn place_in_box_preserves_coordinate_order() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 40, 4), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        let a = ckt.add_block("a", ty, 20.0, 0.0, PlaceStatus::Unplaced);
        let b = ckt.add_block("b", ty, 4.0, 0.0, PlaceStatus::Unplaced);
        let c = ckt.add_block("c", ty, 30.0, 0.0, PlaceStatus::Unplaced);
        let mesh = GridMesh::new(&ckt, 30);
        let bx = BoxBin {
            window: mesh.full_window(),
            cells: vec![a, b, c],
            cell_area: 12.0,
        };
        place_in_box(&mut ckt, &mesh, &bx);
        // b was leftmost, then a, then c; spreading keeps that order.
        assert!(ckt.block(b).x() < ckt.block(a).x());
        assert!(ckt.block(a).x() < ckt.block(c).x());
    }

    #[test]
    fn minimum_window_grows_to_fit() {
        let ckt = clumped_circuit();
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.5);
        let clusters = mesh.find_overfill_clusters();
        let w = find_minimum_window(&mesh, &clusters[0], 0.5).unwrap();
        assert!(mesh.cell_area_in(&w) <= 0.5 * mesh.white_space_in(&w));
    }
}
