//! Quadratic global placement with look-ahead legalization.
//!
//! The outer loop alternates two bounds on the achievable wire length:
//! a quadratic solve gives a lower bound (cells overlap freely), the
//! density spreading of look-ahead legalization gives an upper bound.
//! Anchor springs of growing strength α hand the placement over from
//! pure wirelength to the spread positions until the upper-bound series
//! converges or oscillates inside a small band.

pub mod grid;
pub mod matrix;
pub mod net_model;
pub mod spread;

use crate::config::{InitialPlacement, PlacementOptions};
use crate::error::PlaceError;
use crate::global::grid::GridMesh;
use crate::global::matrix::solve_cg;
use crate::global::net_model::{Axis, ProblemBuilder};
use crate::global::spread::spread_cluster;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_circuit::Circuit;
use strata_diagnostics::{Diagnostic, DiagnosticSink, Phase};

/// Result of a finished global placement.
#[derive(Debug, Clone)]
pub struct GlobalOutcome {
    /// Final half-perimeter wire length.
    pub hpwl: f64,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Lower-bound HPWL after each quadratic placement call.
    pub lower_bound_hpwl: Vec<f64>,
    /// Upper-bound HPWL after each look-ahead legalization.
    pub upper_bound_hpwl: Vec<f64>,
}

/// The global placement engine.
pub struct GlobalPlacer<'a> {
    ckt: &'a mut Circuit,
    opts: &'a PlacementOptions,
    sink: &'a DiagnosticSink,
    builder: ProblemBuilder,
    mesh: GridMesh,
    anchor_x: DVector<f64>,
    anchor_y: DVector<f64>,
    alpha: f64,
    lower_bound_hpwl: Vec<f64>,
    upper_bound_hpwl: Vec<f64>,
}

impl<'a> GlobalPlacer<'a> {
    /// Creates a placer over the circuit's current movable blocks.
    pub fn new(
        ckt: &'a mut Circuit,
        opts: &'a PlacementOptions,
        sink: &'a DiagnosticSink,
    ) -> Self {
        let builder = ProblemBuilder::new(ckt, opts);
        let mesh = GridMesh::new(ckt, opts.number_of_cell_in_bin);
        let movable = builder.movable.len();
        Self {
            ckt,
            opts,
            sink,
            builder,
            mesh,
            anchor_x: DVector::zeros(movable),
            anchor_y: DVector::zeros(movable),
            alpha: 0.0,
            lower_bound_hpwl: Vec::new(),
            upper_bound_hpwl: Vec::new(),
        }
    }

    /// Runs the outer loop to convergence.
    ///
    /// On success the blocks hold the spread layout of the last
    /// iteration. Exhausting `max_iter`, or failing to find a bounding
    /// box during spreading, surfaces
    /// [`PlaceError::Convergence`] with the best HPWL seen; the blocks
    /// keep the last legal layout.
    pub fn run(mut self) -> Result<GlobalOutcome, PlaceError> {
        if self.builder.movable.is_empty() {
            return Ok(GlobalOutcome {
                hpwl: self.ckt.hpwl(),
                iterations: 0,
                lower_bound_hpwl: self.lower_bound_hpwl,
                upper_bound_hpwl: self.upper_bound_hpwl,
            });
        }

        self.init_locations();
        self.quadratic_placement(false)?;
        self.sink.emit(Diagnostic::info(
            Phase::GlobalPlacement,
            format!("initial quadratic HPWL {:.3}", self.lower_bound_hpwl[0]),
        ));

        let mut best = f64::INFINITY;
        for iter in 0..self.opts.max_iter {
            let hpwl = self.look_ahead_legalization(best)?;
            self.upper_bound_hpwl.push(hpwl);
            best = best.min(hpwl);
            self.sink.emit(Diagnostic::info(
                Phase::GlobalPlacement,
                format!("iteration {iter}: HPWL after spreading {hpwl:.3}"),
            ));

            if iter + 1 >= self.opts.min_iter && self.outer_converged() {
                return Ok(GlobalOutcome {
                    hpwl,
                    iterations: iter + 1,
                    lower_bound_hpwl: self.lower_bound_hpwl,
                    upper_bound_hpwl: self.upper_bound_hpwl,
                });
            }

            self.update_anchors();
            self.alpha = (self.opts.alpha_step * (iter + 1) as f64).min(self.opts.alpha_max);
            self.quadratic_placement(true)?;
        }

        self.sink.emit(Diagnostic::error(
            Phase::GlobalPlacement,
            format!("outer iterations exhausted; best HPWL {best:.3}"),
        ));
        Err(PlaceError::Convergence { best_hpwl: best })
    }

    fn init_locations(&mut self) {
        let left = f64::from(self.ckt.left());
        let right = f64::from(self.ckt.right());
        let bottom = f64::from(self.ckt.bottom());
        let top = f64::from(self.ckt.top());
        match self.opts.initial_placement {
            InitialPlacement::Center => {
                let cx = (left + right) / 2.0;
                let cy = (bottom + top) / 2.0;
                for &id in &self.builder.movable {
                    let block = self.ckt.block_mut(id);
                    block.set_center_x(cx);
                    block.set_center_y(cy);
                }
            }
            InitialPlacement::Random => {
                let mut rng = StdRng::seed_from_u64(self.opts.seed);
                for &id in &self.builder.movable {
                    let block = self.ckt.block_mut(id);
                    let max_x = (right - f64::from(block.width)).max(left);
                    let max_y = (top - f64::from(block.height)).max(bottom);
                    block.llx = left + rng.gen::<f64>() * (max_x - left);
                    block.lly = bottom + rng.gen::<f64>() * (max_y - bottom);
                }
            }
        }
    }

    /// Rebuilds and solves the per-axis systems until the HPWL change
    /// stays below the stop criterion for three passes.
    fn quadratic_placement(&mut self, with_anchor: bool) -> Result<f64, PlaceError> {
        let mut hpwl_old = f64::MAX;
        let mut stall = 0usize;
        let mut total_cg = 0usize;
        let mut hpwl = self.ckt.hpwl();

        for _ in 0..self.opts.b2b_update_max_iteration {
            total_cg += self.solve_axis(Axis::X, with_anchor)?;
            total_cg += self.solve_axis(Axis::Y, with_anchor)?;

            hpwl = self.ckt.hpwl();
            let rel = (hpwl_old - hpwl).abs() / hpwl.max(1e-12);
            if rel < self.opts.net_model_update_stop_criterion {
                stall += 1;
                if stall >= 3 {
                    break;
                }
            } else {
                stall = 0;
            }
            hpwl_old = hpwl;

            if total_cg >= self.opts.cg_iteration_max_num {
                break;
            }
        }

        self.lower_bound_hpwl.push(hpwl);
        Ok(hpwl)
    }

    fn solve_axis(&mut self, axis: Axis, with_anchor: bool) -> Result<usize, PlaceError> {
        match axis {
            Axis::X => self.ckt.update_all_net_extrema_x(),
            Axis::Y => self.ckt.update_all_net_extrema_y(),
        }
        let anchor = if with_anchor {
            match axis {
                Axis::X => Some((&self.anchor_x, self.alpha)),
                Axis::Y => Some((&self.anchor_y, self.alpha)),
            }
        } else {
            None
        };
        let problem = self.builder.build(self.ckt, self.opts, axis, anchor);
        if !problem.is_finite() {
            return Err(PlaceError::Numeric {
                reason: "assembled system contains non-finite values".into(),
            });
        }
        let mut solution = problem.guess.clone();
        let outcome = solve_cg(
            &problem.matrix,
            &problem.rhs,
            &mut solution,
            self.opts.cg_tolerance,
            self.opts.cg_iteration,
        );
        if outcome.diverged {
            // solve_cg already restored the best iterate.
            self.sink.emit(Diagnostic::warning(
                Phase::GlobalPlacement,
                "conjugate gradient diverged; keeping previous iterate",
            ));
        }
        self.builder.apply(self.ckt, axis, &solution);
        Ok(outcome.iterations)
    }

    /// Runs one look-ahead legalization pass and returns the HPWL of the
    /// spread layout.
    fn look_ahead_legalization(&mut self, best: f64) -> Result<f64, PlaceError> {
        self.mesh.update_state(self.ckt, self.opts.filling_rate);
        let clusters = self.mesh.find_overfill_clusters();
        for cluster in &clusters {
            if spread_cluster(
                self.ckt,
                &self.mesh,
                cluster,
                self.opts.filling_rate,
                self.opts.box_cell_threshold,
            )
            .is_err()
            {
                let best_hpwl = if best.is_finite() { best } else { self.ckt.hpwl() };
                self.sink.emit(Diagnostic::error(
                    Phase::GlobalPlacement,
                    "no bounding box inside the die can absorb an over-filled cluster",
                ));
                return Err(PlaceError::Convergence { best_hpwl });
            }
        }
        Ok(self.ckt.hpwl())
    }

    fn update_anchors(&mut self) {
        for (i, &id) in self.builder.movable.iter().enumerate() {
            let block = self.ckt.block(id);
            self.anchor_x[i] = block.llx;
            self.anchor_y[i] = block.lly;
        }
    }

    fn outer_converged(&self) -> bool {
        is_series_converging(
            &self.upper_bound_hpwl,
            self.opts.convergence_window,
            self.opts.simpl_lal_converge_criterion,
        ) || is_series_oscillating(
            &self.upper_bound_hpwl,
            self.opts.convergence_window,
            self.opts.polar_converge_criterion,
        )
    }
}

/// Returns whether the last `window` relative deltas of `data` are all
/// below `tolerance`.
pub fn is_series_converging(data: &[f64], window: usize, tolerance: f64) -> bool {
    if data.len() <= window {
        return false;
    }
    let tail = &data[data.len() - window - 1..];
    tail.windows(2).all(|pair| {
        let denom = pair[1].abs().max(1e-12);
        (pair[0] - pair[1]).abs() / denom < tolerance
    })
}

/// Returns whether the last `window` deltas of `data` alternate in sign
/// inside a relative amplitude `band`.
pub fn is_series_oscillating(data: &[f64], window: usize, band: f64) -> bool {
    if data.len() <= window {
        return false;
    }
    let tail = &data[data.len() - window - 1..];
    let deltas: Vec<f64> = tail.windows(2).map(|pair| pair[1] - pair[0]).collect();
    if deltas.iter().any(|d| *d == 0.0) {
        return false;
    }
    if !deltas.windows(2).all(|pair| pair[0] * pair[1] < 0.0) {
        return false;
    }
    let scale = data.last().copied().unwrap_or(0.0).abs().max(1e-12);
    deltas.iter().all(|d| d.abs() / scale < band)
}
