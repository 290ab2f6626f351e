//! Emission of the legalized well geometry.
//!
//! The legalizer leaves behind a [`WellMap`]: per column, the cluster
//! rectangles and the ascending list of P/N-edge y coordinates. The
//! emitters write the map into the text formats consumed downstream
//! (plotting octuples, the router's `.cluster` file, and the
//! manufacturing-grid `.rect` file). DEF emission stays with the
//! circuit collaborator.

use crate::error::PlaceError;
use crate::well::stripe::Stripe;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use strata_circuit::{Circuit, Tech};
use strata_common::RectInt;

/// The well geometry of one column stripe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellColumn {
    /// Left edge.
    pub lx: i32,
    /// Right edge.
    pub ux: i32,
    /// Whether the bottom row is N-oriented (p-well first).
    pub first_row_orient_n: bool,
    /// Cluster rectangles, bottom-up.
    pub clusters: Vec<RectInt>,
    /// Ascending y coordinates of well boundaries, from the column
    /// bottom to its top; consecutive pairs bound alternating wells.
    pub pn_edges: Vec<i32>,
}

/// A snapshot of the legalized well geometry, ready for emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellMap {
    /// The placement region.
    pub region: RectInt,
    /// One entry per stripe that received clusters.
    pub columns: Vec<WellColumn>,
}

/// Builds the well map from the legalizer's stripes.
///
/// Stripes without clusters carry no wells and are skipped.
pub fn build_well_map(ckt: &Circuit, stripes: &[Stripe]) -> WellMap {
    let mut columns = Vec::with_capacity(stripes.len());
    for stripe in stripes {
        if stripe.clusters.is_empty() {
            continue;
        }
        let order: Vec<usize> = if stripe.is_bottom_up {
            (0..stripe.clusters.len()).collect()
        } else {
            (0..stripe.clusters.len()).rev().collect()
        };
        let mut pn_edges = Vec::with_capacity(stripe.clusters.len() + 2);
        let mut clusters = Vec::with_capacity(stripe.clusters.len());
        pn_edges.push(stripe.ly);
        for i in order {
            let c = &stripe.clusters[i];
            pn_edges.push(c.ly + c.pn_edge());
            clusters.push(RectInt::new(stripe.lx, c.ly, stripe.urx(), c.ury()));
        }
        pn_edges.push(stripe.uy);
        columns.push(WellColumn {
            lx: stripe.lx,
            ux: stripe.urx(),
            first_row_orient_n: stripe.first_row_orient_n,
            clusters,
            pn_edges,
        });
    }
    WellMap {
        region: ckt.region,
        columns,
    }
}

/// Writes all result files with the given path prefix.
///
/// Produces `<base>_outline.txt`, `<base>_cluster.txt`,
/// `<base>_pwell.txt`, `<base>_nwell.txt`, `<base>_well.rect`, and
/// `<base>_router.cluster`.
pub fn emit_well_files(map: &WellMap, tech: &Tech, base: &Path) -> Result<(), PlaceError> {
    emit_outline(map, &suffixed(base, "_outline.txt"))?;
    emit_clusters(map, &suffixed(base, "_cluster.txt"))?;
    emit_well_octuples(
        map,
        &suffixed(base, "_pwell.txt"),
        &suffixed(base, "_nwell.txt"),
    )?;
    emit_well_rect(map, tech, &suffixed(base, "_well.rect"))?;
    emit_router_cluster(map, tech, &suffixed(base, "_router.cluster"))?;
    Ok(())
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{suffix}", base.display()))
}

fn with_writer(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), PlaceError> {
    let file = File::create(path).map_err(|source| PlaceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|source| PlaceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn octuple(w: &mut impl Write, lx: i32, ux: i32, ly: i32, uy: i32) -> io::Result<()> {
    writeln!(w, "{lx}\t{ux}\t{ux}\t{lx}\t{ly}\t{ly}\t{uy}\t{uy}")
}

fn emit_outline(map: &WellMap, path: &Path) -> Result<(), PlaceError> {
    with_writer(path, |w| {
        octuple(
            w,
            map.region.llx,
            map.region.urx,
            map.region.lly,
            map.region.ury,
        )
    })
}

fn emit_clusters(map: &WellMap, path: &Path) -> Result<(), PlaceError> {
    with_writer(path, |w| {
        for col in &map.columns {
            for rect in &col.clusters {
                octuple(w, rect.llx, rect.urx, rect.lly, rect.ury)?;
            }
        }
        Ok(())
    })
}

fn emit_well_octuples(
    map: &WellMap,
    p_path: &Path,
    n_path: &Path,
) -> Result<(), PlaceError> {
    with_writer(p_path, |w| write_polarity(map, w, true))?;
    with_writer(n_path, |w| write_polarity(map, w, false))
}

fn write_polarity(map: &WellMap, w: &mut impl Write, want_p: bool) -> io::Result<()> {
    for col in &map.columns {
        let mut is_p = col.first_row_orient_n;
        for pair in col.pn_edges.windows(2) {
            if is_p == want_p {
                octuple(w, col.lx, col.ux, pair[0], pair[1])?;
            }
            is_p = !is_p;
        }
    }
    Ok(())
}

fn scale(v: i32, factor: f64, offset: i32) -> i64 {
    (f64::from(v) * factor) as i64 + i64::from(offset)
}

fn emit_well_rect(map: &WellMap, tech: &Tech, path: &Path) -> Result<(), PlaceError> {
    let fx = tech.factor_x();
    let fy = tech.factor_y();
    with_writer(path, |w| {
        for col in &map.columns {
            let mut is_p = col.first_row_orient_n;
            let lx = scale(col.lx, fx, tech.die_area_offset_x);
            let ux = scale(col.ux, fx, tech.die_area_offset_x);
            for pair in col.pn_edges.windows(2) {
                let ly = scale(pair[0], fy, tech.die_area_offset_y);
                let uy = scale(pair[1], fy, tech.die_area_offset_y);
                if is_p {
                    writeln!(w, "pwell GND {lx} {ly} {ux} {uy}")?;
                } else {
                    writeln!(w, "nwell Vdd {lx} {ly} {ux} {uy}")?;
                }
                is_p = !is_p;
            }
        }
        Ok(())
    })
}

fn emit_router_cluster(map: &WellMap, tech: &Tech, path: &Path) -> Result<(), PlaceError> {
    let fx = tech.factor_x();
    let fy = tech.factor_y();
    with_writer(path, |w| {
        for (i, col) in map.columns.iter().enumerate() {
            writeln!(w, "STRIP column{i}")?;
            let lx = scale(col.lx, fx, tech.die_area_offset_x);
            let ux = scale(col.ux, fx, tech.die_area_offset_x);
            let rail = if col.first_row_orient_n { "GND" } else { "Vdd" };
            writeln!(w, "  {lx}  {ux}  {rail}")?;
            for rect in &col.clusters {
                let ly = scale(rect.lly, fy, tech.die_area_offset_y);
                let uy = scale(rect.ury, fy, tech.die_area_offset_y);
                writeln!(w, "  {ly}  {uy}")?;
            }
            writeln!(w, "END column{i}")?;
            writeln!(w)?;
        }
        Ok(())
    })
}
