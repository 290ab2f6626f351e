//! Strata placement engine: quadratic global placement plus well-aware
//! cluster legalization for standard-cell designs.
//!
//! The engine takes a [`Circuit`] (blocks, nets, well rules, region)
//! and produces legal, non-overlapping coordinates for every movable
//! block such that half-perimeter wire length is minimized and every
//! cell row satisfies the well-abutment and max-plug-distance rules.
//!
//! # Pipeline
//!
//! 1. **Validate**: option, region, and capacity checks
//! 2. **Global place**: B2B quadratic solves alternating with
//!    look-ahead legalization until the wirelength series converges
//! 3. **Legalize**: column stripes, well-height clusters, orientation
//!    alternation, local reordering, well-tap insertion
//! 4. **Emit**: optional result files from the returned [`WellMap`]
//!
//! # Usage
//!
//! ```ignore
//! use strata_place::{emit_well_files, place, PlacementOptions};
//!
//! let opts = PlacementOptions::default();
//! let sink = DiagnosticSink::new();
//! let summary = place(&mut circuit, &opts, &sink)?;
//! emit_well_files(&summary.well_map, &circuit.tech, Path::new("out/result"))?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod global;
pub mod well;

pub use config::{
    load_options, options_from_str, ClusterStrategy, InitialPlacement, NetModel, PlacementOptions,
};
pub use error::PlaceError;
pub use global::{GlobalOutcome, GlobalPlacer};
pub use well::emit::{build_well_map, emit_well_files, WellColumn, WellMap};
pub use well::WellLegalizer;

use strata_circuit::{Circuit, PlaceStatus};
use strata_diagnostics::{Diagnostic, DiagnosticSink, Phase};

/// Result of a completed placement run.
#[derive(Debug, Clone)]
pub struct PlacementSummary {
    /// Final half-perimeter wire length after legalization.
    pub hpwl: f64,
    /// HPWL at the end of global placement.
    pub global_hpwl: f64,
    /// Outer iterations the global placer used.
    pub global_iterations: usize,
    /// Upper-bound HPWL after each global iteration's spreading pass.
    pub global_hpwl_series: Vec<f64>,
    /// The legalized well geometry, ready for emission.
    pub well_map: WellMap,
}

/// Runs the full two-stage placement flow.
///
/// On success every movable block is `Placed` at legal coordinates and
/// the summary carries the well map. On failure no output files are
/// produced; the circuit holds the last well-defined layout (see
/// [`PlaceError`] for the per-kind guarantees).
pub fn place(
    ckt: &mut Circuit,
    opts: &PlacementOptions,
    sink: &DiagnosticSink,
) -> Result<PlacementSummary, PlaceError> {
    if let Err(err) = opts.validate(ckt) {
        sink.emit(Diagnostic::error(Phase::Setup, err.to_string()));
        return Err(err);
    }
    if let Err(err) = check_capacity(ckt) {
        sink.emit(Diagnostic::error(Phase::Setup, err.to_string()));
        return Err(err);
    }

    let global = GlobalPlacer::new(ckt, opts, sink).run()?;

    let legalizer = WellLegalizer::new(ckt, opts, sink)?;
    let well_map = legalizer.run()?;

    for block in ckt.blocks.iter_mut() {
        if block.status == PlaceStatus::Unplaced {
            block.status = PlaceStatus::Placed;
        }
    }

    let hpwl = ckt.hpwl();
    sink.emit(Diagnostic::info(
        Phase::Output,
        format!("placement complete, HPWL {hpwl:.3}"),
    ));
    Ok(PlacementSummary {
        hpwl,
        global_hpwl: global.hpwl,
        global_iterations: global.iterations,
        global_hpwl_series: global.upper_bound_hpwl,
        well_map,
    })
}

/// Rejects circuits whose movable cells cannot fit the region.
fn check_capacity(ckt: &Circuit) -> Result<(), PlaceError> {
    let cell_area = ckt.total_movable_area();
    let region_area = ckt.region.area();
    if cell_area > region_area {
        return Err(PlaceError::Capacity {
            reason: "total movable cell area exceeds region area".into(),
            cell_area,
            region_area,
        });
    }
    let max_w = ckt.max_movable_width();
    let max_h = ckt.max_movable_height();
    if max_w > ckt.region_width() || max_h > ckt.region_height() {
        return Err(PlaceError::Capacity {
            reason: format!(
                "largest cell dimension {max_w}x{max_h} exceeds the region"
            ),
            cell_area,
            region_area,
        });
    }
    Ok(())
}
