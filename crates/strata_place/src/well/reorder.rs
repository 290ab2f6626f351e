//! Local reordering: sliding-window permutation search inside clusters.
//!
//! For every window of `range` consecutive cells the members are
//! distributed evenly between the window's outer bounds and every
//! permutation is scored by the wire length of the touched nets. The
//! best order is kept. Windows slide left to right; several passes over
//! all clusters refine the result.

use crate::well::cluster::Cluster;
use crate::well::stripe::Stripe;
use itertools::Itertools;
use std::collections::BTreeSet;
use strata_circuit::{BlockId, Circuit, NetId};

/// Reorders every cluster, lowest-left first.
pub fn local_reorder_all_clusters(
    ckt: &mut Circuit,
    stripes: &mut [Stripe],
    range: usize,
    net_ignore_threshold: usize,
) {
    let mut order: Vec<(i32, i32, usize, usize)> = Vec::new();
    for (si, stripe) in stripes.iter().enumerate() {
        for (ci, cluster) in stripe.clusters.iter().enumerate() {
            order.push((cluster.ly, cluster.lx, si, ci));
        }
    }
    order.sort_unstable();
    for (_, _, si, ci) in order {
        reorder_cluster(
            ckt,
            &mut stripes[si].clusters[ci],
            range,
            net_ignore_threshold,
        );
    }
}

/// Runs the permutation search over one cluster.
pub fn reorder_cluster(
    ckt: &mut Circuit,
    cluster: &mut Cluster,
    range: usize,
    net_ignore_threshold: usize,
) {
    let sz = cluster.blocks.len();
    if sz < 3 || sz < range {
        return;
    }
    cluster.blocks.sort_unstable_by(|&a, &b| {
        let ba = ckt.block(a).llx;
        let bb = ckt.block(b).llx;
        ba.partial_cmp(&bb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    for l in 0..=(sz - range) {
        let window: Vec<BlockId> = cluster.blocks[l..l + range].to_vec();
        let left_bound = ckt.block(window[0]).llx;
        let right_bound = ckt.block(window[range - 1]).urx();
        let total_width: i32 = window.iter().map(|&id| ckt.block(id).width).sum();
        let gap = (right_bound - left_bound - f64::from(total_width)) / (range as f64 - 1.0);

        let nets = involved_nets(ckt, &window, net_ignore_threshold);
        if nets.is_empty() {
            continue;
        }

        let mut best_cost = f64::INFINITY;
        let mut best = window.clone();
        for perm in window.iter().copied().permutations(range) {
            place_window(ckt, &perm, left_bound, gap);
            let cost = wire_length_cost(ckt, &nets);
            if cost < best_cost {
                best_cost = cost;
                best = perm;
            }
        }
        place_window(ckt, &best, left_bound, gap);
        cluster.blocks[l..l + range].copy_from_slice(&best);
    }
}

/// Collects the nets touching a window, skipping high-fanout nets.
fn involved_nets(ckt: &Circuit, window: &[BlockId], threshold: usize) -> BTreeSet<NetId> {
    let mut nets = BTreeSet::new();
    for &id in window {
        for &net_id in &ckt.block(id).nets {
            if ckt.net(net_id).pin_count() < threshold {
                nets.insert(net_id);
            }
        }
    }
    nets
}

fn wire_length_cost(ckt: &Circuit, nets: &BTreeSet<NetId>) -> f64 {
    nets.iter()
        .map(|&n| {
            ckt.net_hpwl_x(n) * ckt.tech.grid_value_x + ckt.net_hpwl_y(n) * ckt.tech.grid_value_y
        })
        .sum()
}

/// Lays the window out left to right with a common gap.
fn place_window(ckt: &mut Circuit, order: &[BlockId], left_bound: f64, gap: f64) {
    let mut contour = left_bound;
    for &id in order {
        let block = ckt.block_mut(id);
        block.llx = contour;
        contour = block.urx() + gap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_circuit::{
        BlockType, BlockTypeId, NetPin, PinOffset, PlaceStatus, Tech, WellInfo,
    };
    use strata_common::RectInt;

    fn cell_type(width: i32) -> BlockType {
        BlockType {
            id: BlockTypeId::from_raw(0),
            name: "C".into(),
            width,
            height: 10,
            pins: vec![PinOffset {
                name: "P".into(),
                dx: f64::from(width) / 2.0,
                dy: 5.0,
            }],
            well: Some(WellInfo {
                p_height: 5,
                n_height: 5,
            }),
        }
    }

    fn three_cell_cluster() -> (Circuit, Cluster, BlockId, BlockId, BlockId) {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 200, 20), Tech::default());
        let ty = ckt.add_block_type(cell_type(4));
        let a = ckt.add_block("a", ty, 0.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", ty, 4.0, 0.0, PlaceStatus::Placed);
        let c = ckt.add_block("c", ty, 8.0, 0.0, PlaceStatus::Placed);
        let mut cluster = Cluster::new(0, 40);
        cluster.blocks = vec![a, b, c];
        cluster.update_well_height_from_bottom(5, 5);
        (ckt, cluster, a, b, c)
    }

    #[test]
    fn pulls_connected_cell_toward_its_pin() {
        let (mut ckt, mut cluster, _a, b, c) = three_cell_cluster();
        // b is tied to a fixed block far to the right; the best order in
        // the window puts b rightmost.
        let far = ckt.add_block_type(cell_type(4));
        let anchor = ckt.add_block("anchor", far, 150.0, 0.0, PlaceStatus::Fixed);
        ckt.add_net(
            "pull",
            1.0,
            vec![
                NetPin { block: b, pin: 0 },
                NetPin {
                    block: anchor,
                    pin: 0,
                },
            ],
        );
        reorder_cluster(&mut ckt, &mut cluster, 3, 100);
        assert!(ckt.block(b).llx > ckt.block(c).llx);
        assert_eq!(cluster.blocks[2], b);
    }

    #[test]
    fn no_nets_means_no_movement() {
        let (mut ckt, mut cluster, a, b, c) = three_cell_cluster();
        reorder_cluster(&mut ckt, &mut cluster, 3, 100);
        assert_eq!(ckt.block(a).llx, 0.0);
        assert_eq!(ckt.block(b).llx, 4.0);
        assert_eq!(ckt.block(c).llx, 8.0);
    }

    #[test]
    fn small_cluster_is_skipped() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 100, 20), Tech::default());
        let ty = ckt.add_block_type(cell_type(4));
        let a = ckt.add_block("a", ty, 3.0, 0.0, PlaceStatus::Placed);
        let b = ckt.add_block("b", ty, 9.0, 0.0, PlaceStatus::Placed);
        let mut cluster = Cluster::new(0, 40);
        cluster.blocks = vec![a, b];
        reorder_cluster(&mut ckt, &mut cluster, 3, 100);
        assert_eq!(ckt.block(a).llx, 3.0);
        assert_eq!(ckt.block(b).llx, 9.0);
    }

    #[test]
    fn high_fanout_nets_are_ignored() {
        let (mut ckt, mut cluster, a, b, c) = three_cell_cluster();
        ckt.add_net(
            "wide",
            1.0,
            vec![
                NetPin { block: a, pin: 0 },
                NetPin { block: b, pin: 0 },
                NetPin { block: c, pin: 0 },
            ],
        );
        // Threshold 3 excludes the 3-pin net, so nothing moves.
        reorder_cluster(&mut ckt, &mut cluster, 3, 3);
        assert_eq!(ckt.block(a).llx, 0.0);
        assert_eq!(ckt.block(b).llx, 4.0);
        assert_eq!(ckt.block(c).llx, 8.0);
    }

    #[test]
    fn window_bounds_are_preserved() {
        let (mut ckt, mut cluster, a, _b, _c) = three_cell_cluster();
        let far = ckt.add_block_type(cell_type(4));
        let anchor = ckt.add_block("anchor", far, 150.0, 0.0, PlaceStatus::Fixed);
        ckt.add_net(
            "pull",
            1.0,
            vec![
                NetPin { block: a, pin: 0 },
                NetPin {
                    block: anchor,
                    pin: 0,
                },
            ],
        );
        reorder_cluster(&mut ckt, &mut cluster, 3, 100);
        // The window occupied [0, 12]; whatever the order, the members
        // still occupy it.
        let min = cluster
            .blocks
            .iter()
            .map(|&id| ckt.block(id).llx)
            .fold(f64::INFINITY, f64::min);
        let max = cluster
            .blocks
            .iter()
            .map(|&id| ckt.block(id).urx())
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 12.0);
    }
}
