//! Engine configuration: every tuning knob of the two-stage flow.

use crate::error::PlaceError;
use serde::Deserialize;
use std::path::Path;
use strata_circuit::Circuit;

/// The quadratic net model used to approximate wire length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetModel {
    /// Bound-to-bound: every pin sprung to the net's extreme pins.
    B2b,
    /// Star: every pin sprung to an auxiliary center variable.
    Star,
    /// Clique-weight HPWL approximation.
    Hpwl,
    /// Cliques for small nets, stars for large ones.
    StarHpwl,
}

/// How clustering decides to open a new row cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// A block above the contour also opens a new cluster.
    Loose,
    /// Only a full cluster opens a new one; block height is ignored.
    Compact,
}

/// How movable blocks get their starting coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPlacement {
    /// All blocks start at the region center.
    Center,
    /// Blocks start at seeded-random positions inside the region.
    Random,
}

/// All options recognized by the placement engine.
///
/// Deserializable from TOML with every field optional; missing fields
/// take the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementOptions {
    /// The quadratic net model family.
    pub net_model: NetModel,
    /// CG stop tolerance on the relative residual.
    pub cg_tolerance: f64,
    /// CG inner iterations per solver call.
    pub cg_iteration: usize,
    /// Upper bound on CG iterations per quadratic placement call.
    pub cg_iteration_max_num: usize,
    /// Relative HPWL change below which the inner net-model loop stalls.
    pub net_model_update_stop_criterion: f64,
    /// Net-model rebuild cap inside one quadratic placement call.
    pub b2b_update_max_iteration: usize,
    /// Relative HPWL change below which the outer series converges.
    pub simpl_lal_converge_criterion: f64,
    /// Relative amplitude band for the oscillation test.
    pub polar_converge_criterion: f64,
    /// Window length for the outer convergence tests.
    pub convergence_window: usize,
    /// Minimum outer iterations before convergence may stop the run.
    pub min_iter: usize,
    /// Maximum outer iterations.
    pub max_iter: usize,
    /// ε = `epsilon_factor` × average movable cell width/height.
    pub epsilon_factor: f64,
    /// Target number of cells per grid bin during look-ahead legalization.
    pub number_of_cell_in_bin: usize,
    /// Nets with more pins than this are ignored by the solver and reorder.
    pub net_ignore_threshold: usize,
    /// Per-iteration growth of the anchor spring factor α.
    pub alpha_step: f64,
    /// Upper bound on α.
    pub alpha_max: f64,
    /// Target density: movable cell area over white space, in (0, 1].
    pub filling_rate: f64,
    /// Stripe target width in units of the max plug distance.
    pub stripe_width_factor: f64,
    /// Clustering strategy for the well legalizer.
    pub cluster_strategy: ClusterStrategy,
    /// Orientation of the first row in every stripe.
    pub first_row_orient_n: bool,
    /// Initial coordinate assignment.
    pub initial_placement: InitialPlacement,
    /// Seed for the deterministic random init.
    pub seed: u64,
    /// Sliding-window size for local reordering.
    pub local_reorder_range: usize,
    /// Number of local-reorder passes over all clusters.
    pub local_reorder_passes: usize,
    /// Bottom-up/top-down alternation cap in the cluster legalizer.
    pub legalizer_max_iter: usize,
    /// Cell-count threshold below which a box is placed directly.
    pub box_cell_threshold: usize,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            net_model: NetModel::B2b,
            cg_tolerance: 1e-35,
            cg_iteration: 10,
            cg_iteration_max_num: 1000,
            net_model_update_stop_criterion: 0.01,
            b2b_update_max_iteration: 50,
            simpl_lal_converge_criterion: 0.005,
            polar_converge_criterion: 0.08,
            convergence_window: 3,
            min_iter: 30,
            max_iter: 100,
            epsilon_factor: 1.5,
            number_of_cell_in_bin: 30,
            net_ignore_threshold: 100,
            alpha_step: 0.005,
            alpha_max: 1.0,
            filling_rate: 0.7,
            stripe_width_factor: 2.0,
            cluster_strategy: ClusterStrategy::Loose,
            first_row_orient_n: true,
            initial_placement: InitialPlacement::Center,
            seed: 1,
            local_reorder_range: 3,
            local_reorder_passes: 6,
            legalizer_max_iter: 10,
            box_cell_threshold: 10,
        }
    }
}

impl PlacementOptions {
    /// Checks option values and the circuit's region and technology.
    ///
    /// All configuration problems are surfaced here, before any placement
    /// work starts.
    pub fn validate(&self, ckt: &Circuit) -> Result<(), PlaceError> {
        if ckt.right() <= ckt.left() || ckt.top() <= ckt.bottom() {
            return Err(PlaceError::Config {
                reason: format!(
                    "illegal region [{}, {}] x [{}, {}]",
                    ckt.left(),
                    ckt.right(),
                    ckt.bottom(),
                    ckt.top()
                ),
            });
        }
        if !(self.filling_rate > 0.0 && self.filling_rate <= 1.0) {
            return Err(PlaceError::Config {
                reason: format!(
                    "filling rate {} outside (0, 1]",
                    self.filling_rate
                ),
            });
        }
        if ckt.tech.row_height <= 0 {
            return Err(PlaceError::Config {
                reason: format!("row height {} must be positive", ckt.tech.row_height),
            });
        }
        if ckt.tech.max_plug_distance <= 0 {
            return Err(PlaceError::Config {
                reason: format!(
                    "max plug distance {} must be positive",
                    ckt.tech.max_plug_distance
                ),
            });
        }
        if self.epsilon_factor <= 0.0 {
            return Err(PlaceError::Config {
                reason: format!("epsilon factor {} must be positive", self.epsilon_factor),
            });
        }
        if self.local_reorder_range < 2 {
            return Err(PlaceError::Config {
                reason: format!(
                    "local reorder range {} must be at least 2",
                    self.local_reorder_range
                ),
            });
        }
        Ok(())
    }
}

/// Parses placement options from a TOML string.
///
/// Unknown keys (including an unknown `net_model`) are configuration
/// errors.
pub fn options_from_str(content: &str) -> Result<PlacementOptions, PlaceError> {
    toml::from_str(content).map_err(|e| PlaceError::Config {
        reason: e.to_string(),
    })
}

/// Loads placement options from a TOML file.
pub fn load_options(path: &Path) -> Result<PlacementOptions, PlaceError> {
    let content = std::fs::read_to_string(path).map_err(|source| PlaceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    options_from_str(&content)
}
