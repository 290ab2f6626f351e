//! Well-aware cluster legalization.
//!
//! Cells are binned into column stripes, packed bottom-up into
//! variable-height clusters that respect the N/P-well height rules, and
//! finished with orientation alternation, local reordering, and well-tap
//! insertion. A bottom-up pass that overflows the stripe top retries
//! top-down; stripes where both directions overflow fail legalization.

pub mod cluster;
pub mod emit;
pub mod reorder;
pub mod stripe;

use crate::config::{ClusterStrategy, PlacementOptions};
use crate::error::PlaceError;
use crate::well::cluster::Cluster;
use crate::well::emit::{build_well_map, WellMap};
use crate::well::stripe::{assign_blocks, build_stripes, Stripe, StripePlan};
use strata_circuit::{BlockId, Circuit, WellInfo};
use strata_diagnostics::{Diagnostic, DiagnosticSink, Phase};

/// Well parameters shared by the packing passes.
#[derive(Debug, Clone, Copy)]
struct TapParams {
    width: i32,
    p_height: i32,
    n_height: i32,
}

/// The well-aware cluster legalizer.
#[derive(Debug)]
pub struct WellLegalizer<'a> {
    ckt: &'a mut Circuit,
    opts: &'a PlacementOptions,
    sink: &'a DiagnosticSink,
    plan: StripePlan,
    tap: TapParams,
    tap_type: strata_circuit::BlockTypeId,
}

impl<'a> WellLegalizer<'a> {
    /// Creates a legalizer, checking that the technology carries a tap
    /// cell and that every movable block has a well descriptor.
    pub fn new(
        ckt: &'a mut Circuit,
        opts: &'a PlacementOptions,
        sink: &'a DiagnosticSink,
    ) -> Result<Self, PlaceError> {
        let tap_type = ckt.tech.well_tap_type.ok_or_else(|| PlaceError::Config {
            reason: "technology does not define a well-tap cell type".into(),
        })?;
        for block in ckt.blocks.iter().filter(|b| b.is_movable()) {
            if ckt.block_type(block.type_id).well.is_none() {
                return Err(PlaceError::Config {
                    reason: format!(
                        "block type {} has no well descriptor",
                        ckt.block_type(block.type_id).name
                    ),
                });
            }
        }
        let tap_well = ckt
            .block_type(tap_type)
            .well
            .ok_or_else(|| PlaceError::Config {
                reason: "well-tap cell type has no well descriptor".into(),
            })?;
        let tap = TapParams {
            width: ckt.block_type(tap_type).width,
            p_height: tap_well.p_height,
            n_height: tap_well.n_height,
        };
        let plan = build_stripes(ckt, opts);
        Ok(Self {
            ckt,
            opts,
            sink,
            plan,
            tap,
            tap_type,
        })
    }

    /// Runs the full legalization flow and returns the well map.
    pub fn run(mut self) -> Result<WellMap, PlaceError> {
        assign_blocks(&mut self.plan, self.ckt);
        self.sink.emit(Diagnostic::info(
            Phase::Legalization,
            format!(
                "{} stripes over {} columns",
                self.plan.stripes.len(),
                self.plan.col_count
            ),
        ));

        self.cluster_blocks()?;
        self.sink.emit(Diagnostic::info(
            Phase::Legalization,
            format!("HPWL after clustering {:.3}", self.ckt.hpwl()),
        ));

        self.trial_cluster_legalization();
        self.update_cluster_orient();

        for _ in 0..self.opts.local_reorder_passes {
            reorder::local_reorder_all_clusters(
                self.ckt,
                &mut self.plan.stripes,
                self.opts.local_reorder_range,
                self.opts.net_ignore_threshold,
            );
        }
        self.sink.emit(Diagnostic::info(
            Phase::Legalization,
            format!("HPWL after local reorder {:.3}", self.ckt.hpwl()),
        ));

        self.insert_well_taps();

        Ok(build_well_map(self.ckt, &self.plan.stripes))
    }

    /// Packs every stripe, alternating bottom-up and top-down passes.
    fn cluster_blocks(&mut self) -> Result<(), PlaceError> {
        let compact = self.opts.cluster_strategy == ClusterStrategy::Compact;
        for (index, stripe) in self.plan.stripes.iter_mut().enumerate() {
            let mut fits = stripe.blocks.is_empty();
            for _ in 0..self.opts.legalizer_max_iter {
                if fits {
                    break;
                }
                fits = stripe_pack_bottom_up(self.ckt, stripe, self.tap, compact);
                if !fits {
                    fits = stripe_pack_top_down(self.ckt, stripe, self.tap, compact);
                }
            }
            if !fits {
                self.sink.emit(Diagnostic::error(
                    Phase::Legalization,
                    format!("stripe {index} overflows in both directions"),
                ));
                return Err(PlaceError::Legalization { stripe: index });
            }
            for cluster in stripe.clusters.iter_mut() {
                cluster.update_block_loc_y(self.ckt);
                cluster.legalize_loose_x(self.ckt);
            }
        }
        Ok(())
    }

    /// Removes cluster overlaps within each stripe, preserving order.
    fn trial_cluster_legalization(&mut self) {
        let ckt = &mut *self.ckt;
        for stripe in self.plan.stripes.iter_mut() {
            if stripe.clusters.is_empty() {
                continue;
            }
            let used: i32 = stripe.clusters.iter().map(|c| c.height).sum();
            if used <= stripe.height() {
                // Sweep from the top, pushing clusters down just enough.
                let order: Vec<usize> = if stripe.is_bottom_up {
                    (0..stripe.clusters.len()).rev().collect()
                } else {
                    (0..stripe.clusters.len()).collect()
                };
                let mut contour = stripe.uy;
                for i in order {
                    let ury = stripe.clusters[i].ury().min(contour);
                    let delta = ury - stripe.clusters[i].ury();
                    if delta != 0 {
                        stripe.clusters[i].set_ury(ury);
                        stripe.clusters[i].shift_blocks_y(ckt, f64::from(delta));
                    }
                    contour = stripe.clusters[i].ly;
                }
            } else {
                // Should not happen after a successful packing pass.
                self.sink.emit(Diagnostic::warning(
                    Phase::Legalization,
                    "stripe usage exceeds its height; packing clusters bottom-up",
                ));
                let order: Vec<usize> = if stripe.is_bottom_up {
                    (0..stripe.clusters.len()).collect()
                } else {
                    (0..stripe.clusters.len()).rev().collect()
                };
                let mut contour = stripe.ly;
                for i in order {
                    let delta = contour - stripe.clusters[i].ly;
                    stripe.clusters[i].ly = contour;
                    contour += stripe.clusters[i].height;
                    if delta != 0 {
                        stripe.clusters[i].shift_blocks_y(ckt, f64::from(delta));
                    }
                }
            }
        }
    }

    /// Alternates cluster orientations from the stripe's first row up.
    fn update_cluster_orient(&mut self) {
        let ckt = &mut *self.ckt;
        for stripe in self.plan.stripes.iter_mut() {
            let mut orient_n = stripe.first_row_orient_n;
            let order: Vec<usize> = if stripe.is_bottom_up {
                (0..stripe.clusters.len()).collect()
            } else {
                (0..stripe.clusters.len()).rev().collect()
            };
            for i in order {
                stripe.clusters[i].set_orient(ckt, orient_n);
                orient_n = !orient_n;
            }
        }
    }

    /// Inserts evenly spaced tap cells into every cluster.
    fn insert_well_taps(&mut self) {
        let max_plug = f64::from(self.ckt.tech.max_plug_distance);
        let mut counter = 0usize;
        for stripe in self.plan.stripes.iter_mut() {
            let tap_count = ((f64::from(stripe.width) / (1.5 * max_plug)).ceil() as i32).max(1);
            for cluster in stripe.clusters.iter_mut() {
                let step = cluster.width / (tap_count + 1);
                let mut loc = cluster.lx + step;
                for _ in 0..tap_count {
                    let name = format!("__well_tap__{counter}");
                    counter += 1;
                    let tap = self.ckt.add_well_tap(name, self.tap_type);
                    cluster.insert_tap(self.ckt, tap, loc);
                    loc += step;
                }
                cluster.legalize_loose_x(self.ckt);
            }
        }
        self.sink.emit(Diagnostic::info(
            Phase::Legalization,
            format!("inserted {counter} well-tap cells"),
        ));
    }
}

fn well_of(ckt: &Circuit, id: BlockId) -> WellInfo {
    let block = ckt.block(id);
    ckt.block_type(block.type_id).well.unwrap_or(WellInfo {
        p_height: block.height,
        n_height: 0,
    })
}

/// Packs a stripe bottom-up. Returns whether the contour stayed inside.
fn stripe_pack_bottom_up(
    ckt: &Circuit,
    stripe: &mut Stripe,
    tap: TapParams,
    compact: bool,
) -> bool {
    stripe.clusters.clear();
    stripe.contour = stripe.ly;
    stripe.used_height = 0;
    stripe.is_bottom_up = true;

    stripe.blocks.sort_unstable_by(|&a, &b| {
        let ba = ckt.block(a);
        let bb = ckt.block(b);
        (ba.lly, ba.llx)
            .partial_cmp(&(bb.lly, bb.llx))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    for k in 0..stripe.blocks.len() {
        let id = stripe.blocks[k];
        append_block_bottom_up(ckt, stripe, id, tap, compact);
    }
    stripe.contour <= stripe.uy
}

/// Packs a stripe top-down, mirroring the bottom-up procedure.
fn stripe_pack_top_down(
    ckt: &Circuit,
    stripe: &mut Stripe,
    tap: TapParams,
    compact: bool,
) -> bool {
    stripe.clusters.clear();
    stripe.contour = stripe.uy;
    stripe.used_height = 0;
    stripe.is_bottom_up = false;

    stripe.blocks.sort_unstable_by(|&a, &b| {
        let ba = ckt.block(a);
        let bb = ckt.block(b);
        // Descending top edge, then ascending x.
        (bb.ury(), ba.llx)
            .partial_cmp(&(ba.ury(), bb.llx))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    for k in 0..stripe.blocks.len() {
        let id = stripe.blocks[k];
        append_block_top_down(ckt, stripe, id, tap, compact);
    }
    stripe.contour >= stripe.ly
}

fn append_block_bottom_up(
    ckt: &Circuit,
    stripe: &mut Stripe,
    id: BlockId,
    tap: TapParams,
    compact: bool,
) {
    let block = ckt.block(id);
    let width = block.width;
    let block_lly = block.lly.round() as i32;
    let well = well_of(ckt, id);

    let mut new_cluster_needed = stripe.contour == stripe.ly && stripe.clusters.is_empty();
    if !new_cluster_needed {
        let above_contour = !compact && stripe.contour <= block_lly;
        let front_full = stripe
            .clusters
            .last()
            .map(|c| c.used_size + width > c.width)
            .unwrap_or(true);
        new_cluster_needed = above_contour || front_full;
    }

    let mut init_y = block_lly.max(stripe.ly);
    if !stripe.clusters.is_empty() {
        init_y = init_y.max(stripe.contour);
    }

    if new_cluster_needed {
        let mut cluster = Cluster::new(stripe.lx, stripe.width);
        cluster.blocks.reserve(stripe.max_blk_capacity_per_cluster);
        cluster.blocks.push(id);
        cluster.used_size = width + tap.width;
        cluster.update_well_height_from_bottom(tap.p_height, tap.n_height);
        cluster.update_well_height_from_bottom(well.p_height, well.n_height);
        cluster.ly = init_y;
        stripe.used_height += cluster.height;
        stripe.clusters.push(cluster);
    } else {
        let front = stripe.clusters.last_mut().unwrap();
        front.blocks.push(id);
        front.use_space(width);
        if well.p_height > front.p_well_height || well.n_height > front.n_well_height {
            let old_height = front.height;
            front.update_well_height_from_bottom(well.p_height, well.n_height);
            stripe.used_height += front.height - old_height;
        }
    }
    stripe.contour = stripe.clusters.last().map(|c| c.ury()).unwrap_or(stripe.ly);
}

fn append_block_top_down(
    ckt: &Circuit,
    stripe: &mut Stripe,
    id: BlockId,
    tap: TapParams,
    compact: bool,
) {
    let block = ckt.block(id);
    let width = block.width;
    let block_ury = block.ury().round() as i32;
    let well = well_of(ckt, id);

    let mut new_cluster_needed = stripe.contour == stripe.uy && stripe.clusters.is_empty();
    if !new_cluster_needed {
        let below_contour = !compact && stripe.contour >= block_ury;
        let front_full = stripe
            .clusters
            .last()
            .map(|c| c.used_size + width > c.width)
            .unwrap_or(true);
        new_cluster_needed = below_contour || front_full;
    }

    let mut init_y = block_ury.min(stripe.uy);
    if !stripe.clusters.is_empty() {
        init_y = init_y.min(stripe.contour);
    }

    if new_cluster_needed {
        let mut cluster = Cluster::new(stripe.lx, stripe.width);
        cluster.blocks.reserve(stripe.max_blk_capacity_per_cluster);
        cluster.blocks.push(id);
        cluster.used_size = width + tap.width;
        cluster.update_well_height_from_top(tap.p_height, tap.n_height);
        cluster.update_well_height_from_top(well.p_height, well.n_height);
        cluster.set_ury(init_y);
        stripe.used_height += cluster.height;
        stripe.clusters.push(cluster);
    } else {
        let front = stripe.clusters.last_mut().unwrap();
        front.blocks.push(id);
        front.use_space(width);
        if well.p_height > front.p_well_height || well.n_height > front.n_well_height {
            let old_height = front.height;
            front.update_well_height_from_top(well.p_height, well.n_height);
            stripe.used_height += front.height - old_height;
        }
    }
    stripe.contour = stripe.clusters.last().map(|c| c.ly).unwrap_or(stripe.uy);
}
