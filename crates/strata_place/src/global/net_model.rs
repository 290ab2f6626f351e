//! Quadratic net models: assembling the per-axis linear systems.
//!
//! For each axis the wirelength surrogate is a spring system over the
//! movable blocks. Fixed blocks and I/O pads contribute to the right-hand
//! side but own no variable. The bound-to-bound model springs every pin
//! to its net's extreme pins; the star model introduces one auxiliary
//! center variable per net; the HPWL model is the clique approximation.

use crate::config::{NetModel, PlacementOptions};
use crate::global::matrix::{SparseMatrix, Triplet};
use nalgebra::DVector;
use strata_circuit::{BlockId, Circuit, Net, NetPin};

/// Weak spring pulling otherwise unconstrained variables to the region
/// center, keeping the system positive definite.
const CENTER_PULL_WEIGHT: f64 = 0.01;

/// The axis a problem is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal coordinates.
    X,
    /// Vertical coordinates.
    Y,
}

/// An assembled per-axis system `A·v = b` with an initial guess.
#[derive(Debug)]
pub struct QuadraticProblem {
    /// The system matrix.
    pub matrix: SparseMatrix,
    /// The right-hand side.
    pub rhs: DVector<f64>,
    /// Initial guess (current coordinates).
    pub guess: DVector<f64>,
}

impl QuadraticProblem {
    /// Returns whether the assembled system contains only finite values.
    pub fn is_finite(&self) -> bool {
        self.rhs.iter().all(|v| v.is_finite()) && self.guess.iter().all(|v| v.is_finite())
    }
}

/// Builds per-axis quadratic problems over the movable blocks.
///
/// The variable mapping is fixed for the lifetime of a global-placement
/// run; coordinates are re-read from the circuit at every build.
pub struct ProblemBuilder {
    /// Variable index to block.
    pub movable: Vec<BlockId>,
    var_of: Vec<Option<usize>>,
    star_var_of: Vec<Option<usize>>,
    num_vars: usize,
    /// ε along x: `epsilon_factor` × average movable width.
    pub width_epsilon: f64,
    /// ε along y: `epsilon_factor` × average movable height.
    pub height_epsilon: f64,
}

impl ProblemBuilder {
    /// Creates a builder for the circuit's current movable blocks.
    pub fn new(ckt: &Circuit, opts: &PlacementOptions) -> Self {
        let mut movable = Vec::new();
        let mut var_of = vec![None; ckt.block_count()];
        for block in &ckt.blocks {
            if block.is_movable() {
                var_of[block.id.index()] = Some(movable.len());
                movable.push(block.id);
            }
        }

        let mut num_vars = movable.len();
        let mut star_var_of = vec![None; ckt.net_count()];
        for net in &ckt.nets {
            if net_uses_star(net, opts) {
                star_var_of[net.id.index()] = Some(num_vars);
                num_vars += 1;
            }
        }

        Self {
            movable,
            var_of,
            star_var_of,
            num_vars,
            width_epsilon: ckt.average_movable_width() * opts.epsilon_factor,
            height_epsilon: ckt.average_movable_height() * opts.epsilon_factor,
        }
    }

    /// Returns the number of variables (movable blocks plus star centers).
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Assembles the system for one axis.
    ///
    /// `anchor` adds per-cell springs of strength `α/max(|v_i − v̂_i|, ε)`
    /// toward the anchor coordinates. Net extrema caches must be fresh
    /// for the chosen axis.
    pub fn build(
        &self,
        ckt: &Circuit,
        opts: &PlacementOptions,
        axis: Axis,
        anchor: Option<(&DVector<f64>, f64)>,
    ) -> QuadraticProblem {
        let n = self.num_vars;
        let mut triplets = Vec::with_capacity(self.estimate_triplets(ckt, opts));
        let mut rhs = DVector::zeros(n);
        let mut diag_touched = vec![false; n];

        for net in &ckt.nets {
            if !net_usable(net, opts) {
                continue;
            }
            match opts.net_model {
                NetModel::B2b => {
                    self.add_b2b(ckt, net, axis, &mut triplets, &mut rhs, &mut diag_touched)
                }
                NetModel::Star => {
                    self.add_star(ckt, net, axis, &mut triplets, &mut rhs, &mut diag_touched)
                }
                NetModel::Hpwl => {
                    self.add_clique(ckt, net, axis, &mut triplets, &mut rhs, &mut diag_touched)
                }
                NetModel::StarHpwl => {
                    if net.pin_count() <= 3 {
                        self.add_clique(ckt, net, axis, &mut triplets, &mut rhs, &mut diag_touched)
                    } else {
                        self.add_star(ckt, net, axis, &mut triplets, &mut rhs, &mut diag_touched)
                    }
                }
            }
        }

        if let Some((anchors, alpha)) = anchor {
            if alpha > 0.0 {
                self.add_anchor_springs(ckt, axis, anchors, alpha, &mut triplets, &mut rhs, &mut diag_touched);
            }
        }

        // Ground unconstrained variables so A stays positive definite.
        let center = match axis {
            Axis::X => (f64::from(ckt.left()) + f64::from(ckt.right())) / 2.0,
            Axis::Y => (f64::from(ckt.bottom()) + f64::from(ckt.top())) / 2.0,
        };
        for (i, touched) in diag_touched.iter().enumerate() {
            if !touched {
                let target = if i < self.movable.len() {
                    let block = ckt.block(self.movable[i]);
                    match axis {
                        Axis::X => center - f64::from(block.width) / 2.0,
                        Axis::Y => center - f64::from(block.height) / 2.0,
                    }
                } else {
                    center
                };
                triplets.push(Triplet::new(i, i, CENTER_PULL_WEIGHT));
                rhs[i] += CENTER_PULL_WEIGHT * target;
            }
        }

        QuadraticProblem {
            matrix: SparseMatrix::from_triplets(n, triplets),
            rhs,
            guess: self.initial_guess(ckt, axis),
        }
    }

    /// Writes a solution back into the circuit, clamped into the region.
    pub fn apply(&self, ckt: &mut Circuit, axis: Axis, solution: &DVector<f64>) {
        let (lo_edge, hi_edge) = match axis {
            Axis::X => (f64::from(ckt.region.llx), f64::from(ckt.region.urx)),
            Axis::Y => (f64::from(ckt.region.lly), f64::from(ckt.region.ury)),
        };
        for (i, &id) in self.movable.iter().enumerate() {
            let block = ckt.block_mut(id);
            let size = match axis {
                Axis::X => block.width,
                Axis::Y => block.height,
            };
            let hi = (hi_edge - f64::from(size)).max(lo_edge);
            let value = solution[i].clamp(lo_edge, hi);
            match axis {
                Axis::X => block.llx = value,
                Axis::Y => block.lly = value,
            }
        }
    }

    fn initial_guess(&self, ckt: &Circuit, axis: Axis) -> DVector<f64> {
        let mut guess = DVector::zeros(self.num_vars);
        for (i, &id) in self.movable.iter().enumerate() {
            let block = ckt.block(id);
            guess[i] = match axis {
                Axis::X => block.llx,
                Axis::Y => block.lly,
            };
        }
        for net in &ckt.nets {
            if let Some(var) = self.star_var_of[net.id.index()] {
                let p = net.pin_count().max(1) as f64;
                let sum: f64 = net
                    .pins
                    .iter()
                    .map(|pin| self.pin_coord(ckt, pin, axis))
                    .sum();
                guess[var] = sum / p;
            }
        }
        guess
    }

    fn epsilon(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.width_epsilon,
            Axis::Y => self.height_epsilon,
        }
    }

    fn pin_coord(&self, ckt: &Circuit, pin: &NetPin, axis: Axis) -> f64 {
        match axis {
            Axis::X => ckt.pin_x(pin),
            Axis::Y => ckt.pin_y(pin),
        }
    }

    fn pin_offset(&self, ckt: &Circuit, pin: &NetPin, axis: Axis) -> f64 {
        let ty = ckt.type_of(pin.block);
        match axis {
            Axis::X => ty.pins[pin.pin].dx,
            Axis::Y => ty.pins[pin.pin].dy,
        }
    }

    fn block_coord(&self, ckt: &Circuit, id: BlockId, axis: Axis) -> f64 {
        let block = ckt.block(id);
        match axis {
            Axis::X => block.llx,
            Axis::Y => block.lly,
        }
    }

    fn add_b2b(
        &self,
        ckt: &Circuit,
        net: &Net,
        axis: Axis,
        triplets: &mut Vec<Triplet>,
        rhs: &mut DVector<f64>,
        diag: &mut [bool],
    ) {
        let (max_idx, min_idx) = match axis {
            Axis::X => (net.max_pin_x, net.min_pin_x),
            Axis::Y => (net.max_pin_y, net.min_pin_y),
        };
        let eps = self.epsilon(axis);
        let base = 2.0 * net.weight * net.inv_p;
        let max_pin = net.pins[max_idx];
        let min_pin = net.pins[min_idx];
        let max_coord = self.pin_coord(ckt, &max_pin, axis);
        let min_coord = self.pin_coord(ckt, &min_pin, axis);

        // The extreme pair is sprung once.
        let w = base / (max_coord - min_coord).abs().max(eps);
        self.add_spring(ckt, axis, &min_pin, &max_pin, w, triplets, rhs, diag);

        for (i, pin) in net.pins.iter().enumerate() {
            if i == max_idx || i == min_idx {
                continue;
            }
            let coord = self.pin_coord(ckt, pin, axis);
            let w_max = base / (coord - max_coord).abs().max(eps);
            self.add_spring(ckt, axis, pin, &max_pin, w_max, triplets, rhs, diag);
            let w_min = base / (coord - min_coord).abs().max(eps);
            self.add_spring(ckt, axis, pin, &min_pin, w_min, triplets, rhs, diag);
        }
    }

    fn add_clique(
        &self,
        ckt: &Circuit,
        net: &Net,
        axis: Axis,
        triplets: &mut Vec<Triplet>,
        rhs: &mut DVector<f64>,
        diag: &mut [bool],
    ) {
        let eps = self.epsilon(axis);
        let base = 2.0 * net.weight * net.inv_p;
        for i in 0..net.pins.len() {
            for j in (i + 1)..net.pins.len() {
                let a = net.pins[i];
                let b = net.pins[j];
                let da = self.pin_coord(ckt, &a, axis);
                let db = self.pin_coord(ckt, &b, axis);
                let w = base / (da - db).abs().max(eps);
                self.add_spring(ckt, axis, &a, &b, w, triplets, rhs, diag);
            }
        }
    }

    fn add_star(
        &self,
        ckt: &Circuit,
        net: &Net,
        axis: Axis,
        triplets: &mut Vec<Triplet>,
        rhs: &mut DVector<f64>,
        diag: &mut [bool],
    ) {
        let center_var = match self.star_var_of[net.id.index()] {
            Some(var) => var,
            // Model mixes may route small nets here; fall back to a clique.
            None => return self.add_clique(ckt, net, axis, triplets, rhs, diag),
        };
        let eps = self.epsilon(axis);
        let p = net.pin_count() as f64;
        let base = 2.0 * net.weight / p;
        let centroid: f64 = net
            .pins
            .iter()
            .map(|pin| self.pin_coord(ckt, pin, axis))
            .sum::<f64>()
            / p;

        for pin in &net.pins {
            let coord = self.pin_coord(ckt, pin, axis);
            let w = base / (coord - centroid).abs().max(eps);
            let offset = self.pin_offset(ckt, pin, axis);
            match self.var_of[pin.block.index()] {
                Some(i) => {
                    triplets.push(Triplet::new(i, i, w));
                    triplets.push(Triplet::new(center_var, center_var, w));
                    triplets.push(Triplet::new(i, center_var, -w));
                    triplets.push(Triplet::new(center_var, i, -w));
                    rhs[i] -= w * offset;
                    rhs[center_var] += w * offset;
                    diag[i] = true;
                    diag[center_var] = true;
                }
                None => {
                    triplets.push(Triplet::new(center_var, center_var, w));
                    rhs[center_var] += w * coord;
                    diag[center_var] = true;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_spring(
        &self,
        ckt: &Circuit,
        axis: Axis,
        a: &NetPin,
        b: &NetPin,
        w: f64,
        triplets: &mut Vec<Triplet>,
        rhs: &mut DVector<f64>,
        diag: &mut [bool],
    ) {
        // A spring between two pins of the same block exerts no net force.
        if a.block == b.block {
            return;
        }
        let oa = self.pin_offset(ckt, a, axis);
        let ob = self.pin_offset(ckt, b, axis);
        match (self.var_of[a.block.index()], self.var_of[b.block.index()]) {
            (Some(i), Some(j)) => {
                triplets.push(Triplet::new(i, i, w));
                triplets.push(Triplet::new(j, j, w));
                triplets.push(Triplet::new(i, j, -w));
                triplets.push(Triplet::new(j, i, -w));
                rhs[i] += w * (ob - oa);
                rhs[j] += w * (oa - ob);
                diag[i] = true;
                diag[j] = true;
            }
            (Some(i), None) => {
                let fixed = self.block_coord(ckt, b.block, axis) + ob;
                triplets.push(Triplet::new(i, i, w));
                rhs[i] += w * (fixed - oa);
                diag[i] = true;
            }
            (None, Some(j)) => {
                let fixed = self.block_coord(ckt, a.block, axis) + oa;
                triplets.push(Triplet::new(j, j, w));
                rhs[j] += w * (fixed - ob);
                diag[j] = true;
            }
            (None, None) => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_anchor_springs(
        &self,
        ckt: &Circuit,
        axis: Axis,
        anchors: &DVector<f64>,
        alpha: f64,
        triplets: &mut Vec<Triplet>,
        rhs: &mut DVector<f64>,
        diag: &mut [bool],
    ) {
        let eps = self.epsilon(axis);
        for (i, &id) in self.movable.iter().enumerate() {
            let coord = self.block_coord(ckt, id, axis);
            let w = alpha / (coord - anchors[i]).abs().max(eps);
            triplets.push(Triplet::new(i, i, w));
            rhs[i] += w * anchors[i];
            diag[i] = true;
        }
    }

    fn estimate_triplets(&self, ckt: &Circuit, opts: &PlacementOptions) -> usize {
        let mut estimate = self.num_vars; // center pulls and anchors
        for net in &ckt.nets {
            if !net_usable(net, opts) {
                continue;
            }
            let p = net.pin_count();
            estimate += match opts.net_model {
                NetModel::B2b => 4 * (2 * p - 3),
                NetModel::Star => 4 * p,
                NetModel::Hpwl => 2 * p * (p - 1),
                NetModel::StarHpwl => {
                    if p <= 3 {
                        2 * p * (p - 1)
                    } else {
                        4 * p
                    }
                }
            };
        }
        estimate
    }
}

fn net_usable(net: &Net, opts: &PlacementOptions) -> bool {
    net.pin_count() >= 2 && net.pin_count() <= opts.net_ignore_threshold
}

fn net_uses_star(net: &Net, opts: &PlacementOptions) -> bool {
    match opts.net_model {
        NetModel::Star => net.pin_count() >= 2 && net.pin_count() <= opts.net_ignore_threshold,
        NetModel::StarHpwl => net.pin_count() > 3 && net.pin_count() <= opts.net_ignore_threshold,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::matrix::solve_cg;
    use strata_circuit::{BlockType, BlockTypeId, PinOffset, PlaceStatus, Tech, WellInfo};
    use strata_common::RectInt;

    fn cell_type(width: i32, height: i32) -> BlockType {
        BlockType {
            id: BlockTypeId::from_raw(0),
            name: "C".into(),
            width,
            height,
            pins: vec![PinOffset {
                name: "P".into(),
                dx: f64::from(width) / 2.0,
                dy: f64::from(height) / 2.0,
            }],
            well: Some(WellInfo {
                p_height: 1,
                n_height: 1,
            }),
        }
    }

    fn simple_circuit() -> Circuit {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 20, 20), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        let a = ckt.add_block("a", ty, 2.0, 2.0, PlaceStatus::Unplaced);
        let b = ckt.add_block("b", ty, 14.0, 10.0, PlaceStatus::Unplaced);
        ckt.add_net(
            "n",
            1.0,
            vec![NetPin { block: a, pin: 0 }, NetPin { block: b, pin: 0 }],
        );
        ckt
    }

    #[test]
    fn b2b_system_is_symmetric_with_positive_diagonal() {
        let ckt = simple_circuit();
        let opts = PlacementOptions::default();
        let builder = ProblemBuilder::new(&ckt, &opts);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        assert!(problem.matrix.is_symmetric(1e-12));
        assert!(problem.matrix.has_positive_diagonal());
        assert!(problem.is_finite());
    }

    #[test]
    fn connected_movable_blocks_pull_together() {
        let mut ckt = simple_circuit();
        let opts = PlacementOptions::default();
        let builder = ProblemBuilder::new(&ckt, &opts);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        let mut x = problem.guess.clone();
        solve_cg(&problem.matrix, &problem.rhs, &mut x, 1e-25, 200);
        builder.apply(&mut ckt, Axis::X, &x);
        let a = ckt.blocks[0].llx;
        let b = ckt.blocks[1].llx;
        assert!((a - b).abs() < 1e-6, "blocks should meet: {a} vs {b}");
    }

    #[test]
    fn fixed_block_pulls_movable_to_it() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 20, 20), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        let fixed = ckt.add_block("f", ty, 10.0, 10.0, PlaceStatus::Fixed);
        let free = ckt.add_block("m", ty, 1.0, 1.0, PlaceStatus::Unplaced);
        ckt.add_net(
            "n",
            1.0,
            vec![
                NetPin { block: fixed, pin: 0 },
                NetPin { block: free, pin: 0 },
            ],
        );
        let opts = PlacementOptions::default();
        let builder = ProblemBuilder::new(&ckt, &opts);
        assert_eq!(builder.num_vars(), 1);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        let mut x = problem.guess.clone();
        solve_cg(&problem.matrix, &problem.rhs, &mut x, 1e-25, 200);
        builder.apply(&mut ckt, Axis::X, &x);
        // Pin-to-pin equality puts the movable block exactly on the fixed one.
        assert!((ckt.block(free).llx - 10.0).abs() < 1e-6);
    }

    #[test]
    fn huge_net_is_ignored() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 200, 200), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        let blocks: Vec<_> = (0..5)
            .map(|i| {
                ckt.add_block(
                    format!("b{i}"),
                    ty,
                    f64::from(i) * 3.0,
                    0.0,
                    PlaceStatus::Unplaced,
                )
            })
            .collect();
        let pins = blocks.iter().map(|&b| NetPin { block: b, pin: 0 }).collect();
        ckt.add_net("big", 1.0, pins);
        let opts = PlacementOptions {
            net_ignore_threshold: 4,
            ..PlacementOptions::default()
        };
        let builder = ProblemBuilder::new(&ckt, &opts);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        // Only the center-pull regularization touches the diagonal.
        for i in 0..5 {
            assert_eq!(problem.matrix.get(i, i), CENTER_PULL_WEIGHT);
        }
    }

    #[test]
    fn star_model_adds_center_variable() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 40, 40), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        let blocks: Vec<_> = (0..3)
            .map(|i| {
                ckt.add_block(
                    format!("b{i}"),
                    ty,
                    f64::from(i) * 10.0,
                    0.0,
                    PlaceStatus::Unplaced,
                )
            })
            .collect();
        let pins = blocks.iter().map(|&b| NetPin { block: b, pin: 0 }).collect();
        ckt.add_net("n", 1.0, pins);
        let opts = PlacementOptions {
            net_model: NetModel::Star,
            ..PlacementOptions::default()
        };
        let builder = ProblemBuilder::new(&ckt, &opts);
        assert_eq!(builder.num_vars(), 4);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        assert!(problem.matrix.is_symmetric(1e-12));
        assert!(problem.matrix.has_positive_diagonal());
    }

    #[test]
    fn anchors_pull_toward_anchor_positions() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 20, 20), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        ckt.add_block("a", ty, 2.0, 2.0, PlaceStatus::Unplaced);
        let opts = PlacementOptions::default();
        let builder = ProblemBuilder::new(&ckt, &opts);
        let anchors = DVector::from_vec(vec![15.0]);
        let problem = builder.build(&ckt, &opts, Axis::X, Some((&anchors, 1.0)));
        let mut x = problem.guess.clone();
        solve_cg(&problem.matrix, &problem.rhs, &mut x, 1e-25, 100);
        // Anchor spring dominates the weak center pull.
        assert!(x[0] > 10.0, "got {}", x[0]);
    }

    #[test]
    fn apply_clamps_into_region() {
        let mut ckt = simple_circuit();
        let opts = PlacementOptions::default();
        let builder = ProblemBuilder::new(&ckt, &opts);
        let solution = DVector::from_vec(vec![-5.0, 100.0]);
        builder.apply(&mut ckt, Axis::X, &solution);
        assert_eq!(ckt.blocks[0].llx, 0.0);
        assert_eq!(ckt.blocks[1].llx, 18.0);
    }

    #[test]
    fn clique_model_matches_pair_for_two_pins() {
        let ckt = simple_circuit();
        let opts = PlacementOptions {
            net_model: NetModel::Hpwl,
            ..PlacementOptions::default()
        };
        let builder = ProblemBuilder::new(&ckt, &opts);
        let problem = builder.build(&ckt, &opts, Axis::X, None);
        assert!(problem.matrix.is_symmetric(1e-12));
        assert!(problem.matrix.get(0, 1) < 0.0);
    }
}
