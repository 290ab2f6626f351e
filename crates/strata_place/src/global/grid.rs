//! Grid bins for density estimation during look-ahead legalization.
//!
//! The die is tiled into bins sized so an average bin holds a target
//! number of cells. White space (area not covered by fixed blocks) is
//! computed once per run; per-bin cell area is rebuilt every iteration.
//! Both are kept as 2-D prefix sums so any bin window can be queried in
//! constant time by inclusion-exclusion.

use strata_circuit::{BlockId, Circuit};
use strata_common::Rect;

/// An inclusive window of bin indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinWindow {
    /// Lowest x bin index.
    pub lx: usize,
    /// Lowest y bin index.
    pub ly: usize,
    /// Highest x bin index (inclusive).
    pub ux: usize,
    /// Highest y bin index (inclusive).
    pub uy: usize,
}

impl BinWindow {
    /// Returns the number of bins spanned along x.
    pub fn span_x(&self) -> usize {
        self.ux - self.lx + 1
    }

    /// Returns the number of bins spanned along y.
    pub fn span_y(&self) -> usize {
        self.uy - self.ly + 1
    }
}

/// One rectangular tile of the die.
#[derive(Debug, Clone)]
pub struct GridBin {
    /// The bin's boundary in cell coordinates.
    pub rect: Rect,
    /// Area not covered by fixed blocks.
    pub white_space: f64,
    /// Total movable cell area binned here this iteration.
    pub cell_area: f64,
    /// Movable blocks whose centers fall in this bin.
    pub cells: Vec<BlockId>,
    /// Fixed blocks overlapping this bin.
    pub terminals: Vec<BlockId>,
    /// Whether cell area exceeds the allowed fill.
    pub over_fill: bool,
    /// Whether the bin is entirely covered by fixed blocks.
    pub all_terminal: bool,
    /// Visited flag for cluster detection.
    pub cluster_visited: bool,
}

/// A connected group of over-filled bins.
#[derive(Debug, Clone)]
pub struct BinCluster {
    /// The member bin indices.
    pub bins: Vec<(usize, usize)>,
    /// Total movable cell area over the member bins.
    pub total_cell_area: f64,
    /// Bounding window of the member bins.
    pub window: BinWindow,
}

/// The bin mesh plus its white-space and cell-area lookup tables.
#[derive(Debug)]
pub struct GridMesh {
    /// Number of bins along x.
    pub cnt_x: usize,
    /// Number of bins along y.
    pub cnt_y: usize,
    /// Bin width in cell coordinates.
    pub bin_width: f64,
    /// Bin height in cell coordinates.
    pub bin_height: f64,
    region: Rect,
    /// The bins, indexed `[x][y]`.
    pub bins: Vec<Vec<GridBin>>,
    white_lut: Vec<Vec<f64>>,
    area_lut: Vec<Vec<f64>>,
}

impl GridMesh {
    /// Builds the mesh and the white-space LUT for the circuit.
    ///
    /// Bin side lengths are chosen so an average bin holds about
    /// `cells_per_bin` movable cells, bounded below by the largest
    /// movable cell dimension.
    pub fn new(ckt: &Circuit, cells_per_bin: usize) -> Self {
        let region = ckt.region.to_rect();
        let movable = ckt.movable_count().max(1);
        let avg_area = ckt.total_movable_area() as f64 / movable as f64;
        let target_side = (cells_per_bin as f64 * avg_area.max(1.0)).sqrt();
        let min_w = f64::from(ckt.max_movable_width().max(1));
        let min_h = f64::from(ckt.max_movable_height().max(1));
        let side_x = target_side.max(min_w);
        let side_y = target_side.max(min_h);

        let cnt_x = ((region.width() / side_x).round() as usize).max(1);
        let cnt_y = ((region.height() / side_y).round() as usize).max(1);
        let bin_width = region.width() / cnt_x as f64;
        let bin_height = region.height() / cnt_y as f64;

        let mut bins: Vec<Vec<GridBin>> = (0..cnt_x)
            .map(|i| {
                (0..cnt_y)
                    .map(|j| {
                        let rect = Rect::new(
                            region.llx + i as f64 * bin_width,
                            region.lly + j as f64 * bin_height,
                            region.llx + (i + 1) as f64 * bin_width,
                            region.lly + (j + 1) as f64 * bin_height,
                        );
                        GridBin {
                            rect,
                            white_space: rect.area(),
                            cell_area: 0.0,
                            cells: Vec::new(),
                            terminals: Vec::new(),
                            over_fill: false,
                            all_terminal: false,
                            cluster_visited: false,
                        }
                    })
                    .collect()
            })
            .collect();

        // Subtract fixed-block coverage from each bin's white space.
        for block in ckt.blocks.iter().filter(|b| b.is_fixed()) {
            let rect = block.rect();
            for column in bins.iter_mut() {
                for bin in column.iter_mut() {
                    let overlap = bin.rect.overlap_area(&rect);
                    if overlap > 0.0 {
                        bin.white_space = (bin.white_space - overlap).max(0.0);
                        bin.terminals.push(block.id);
                    }
                }
            }
        }
        for column in bins.iter_mut() {
            for bin in column.iter_mut() {
                bin.all_terminal = bin.white_space < 1e-9;
            }
        }

        let white_lut = build_prefix(cnt_x, cnt_y, |i, j| bins[i][j].white_space);
        let area_lut = build_prefix(cnt_x, cnt_y, |_, _| 0.0);

        Self {
            cnt_x,
            cnt_y,
            bin_width,
            bin_height,
            region,
            bins,
            white_lut,
            area_lut,
        }
    }

    /// Returns the bin index containing the point, clamped to the mesh.
    pub fn bin_index_of(&self, x: f64, y: f64) -> (usize, usize) {
        let i = ((x - self.region.llx) / self.bin_width).floor() as i64;
        let j = ((y - self.region.lly) / self.bin_height).floor() as i64;
        (
            i.clamp(0, self.cnt_x as i64 - 1) as usize,
            j.clamp(0, self.cnt_y as i64 - 1) as usize,
        )
    }

    /// Rebins every movable block and refreshes over-fill flags and the
    /// cell-area LUT.
    pub fn update_state(&mut self, ckt: &Circuit, filling_rate: f64) {
        for column in self.bins.iter_mut() {
            for bin in column.iter_mut() {
                bin.cells.clear();
                bin.cell_area = 0.0;
                bin.over_fill = false;
                bin.cluster_visited = false;
            }
        }

        for block in ckt.blocks.iter().filter(|b| b.is_movable()) {
            let (i, j) = self.bin_index_of(block.x(), block.y());
            let bin = &mut self.bins[i][j];
            bin.cells.push(block.id);
            bin.cell_area += block.area() as f64;
        }

        for column in self.bins.iter_mut() {
            for bin in column.iter_mut() {
                bin.over_fill = if bin.all_terminal {
                    bin.cell_area > 0.0
                } else {
                    bin.cell_area > filling_rate * bin.white_space
                };
            }
        }

        self.area_lut = build_prefix(self.cnt_x, self.cnt_y, |i, j| self.bins[i][j].cell_area);
    }

    /// Returns the window covering the whole mesh.
    pub fn full_window(&self) -> BinWindow {
        BinWindow {
            lx: 0,
            ly: 0,
            ux: self.cnt_x - 1,
            uy: self.cnt_y - 1,
        }
    }

    /// Returns the total white space inside a bin window.
    pub fn white_space_in(&self, w: &BinWindow) -> f64 {
        query_prefix(&self.white_lut, w)
    }

    /// Returns the total movable cell area inside a bin window.
    pub fn cell_area_in(&self, w: &BinWindow) -> f64 {
        query_prefix(&self.area_lut, w)
    }

    /// Returns the physical rectangle covered by a bin window.
    pub fn window_rect(&self, w: &BinWindow) -> Rect {
        Rect::new(
            self.bins[w.lx][w.ly].rect.llx,
            self.bins[w.lx][w.ly].rect.lly,
            self.bins[w.ux][w.uy].rect.urx,
            self.bins[w.ux][w.uy].rect.ury,
        )
    }

    /// Detects connected clusters of over-filled bins.
    ///
    /// Expands each unvisited over-filled bin over its 4-neighbors and
    /// returns the clusters ordered by descending cell area, ties broken
    /// by the lowest window corner for determinism.
    pub fn find_overfill_clusters(&mut self) -> Vec<BinCluster> {
        let mut clusters = Vec::new();
        for i in 0..self.cnt_x {
            for j in 0..self.cnt_y {
                if !self.bins[i][j].over_fill || self.bins[i][j].cluster_visited {
                    continue;
                }
                let mut members = Vec::new();
                let mut queue = std::collections::VecDeque::new();
                self.bins[i][j].cluster_visited = true;
                queue.push_back((i, j));
                while let Some((x, y)) = queue.pop_front() {
                    members.push((x, y));
                    for (nx, ny) in self.neighbors(x, y) {
                        let bin = &mut self.bins[nx][ny];
                        if bin.over_fill && !bin.cluster_visited {
                            bin.cluster_visited = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }
                let total: f64 = members.iter().map(|&(x, y)| self.bins[x][y].cell_area).sum();
                let window = BinWindow {
                    lx: members.iter().map(|m| m.0).min().unwrap(),
                    ly: members.iter().map(|m| m.1).min().unwrap(),
                    ux: members.iter().map(|m| m.0).max().unwrap(),
                    uy: members.iter().map(|m| m.1).max().unwrap(),
                };
                clusters.push(BinCluster {
                    bins: members,
                    total_cell_area: total,
                    window,
                });
            }
        }
        clusters.sort_by(|a, b| {
            b.total_cell_area
                .partial_cmp(&a.total_cell_area)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.window.lx, a.window.ly).cmp(&(b.window.lx, b.window.ly)))
        });
        clusters
    }

    fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(4);
        if x > 0 {
            out.push((x - 1, y));
        }
        if x + 1 < self.cnt_x {
            out.push((x + 1, y));
        }
        if y > 0 {
            out.push((x, y - 1));
        }
        if y + 1 < self.cnt_y {
            out.push((x, y + 1));
        }
        out
    }
}

fn build_prefix(cnt_x: usize, cnt_y: usize, value: impl Fn(usize, usize) -> f64) -> Vec<Vec<f64>> {
    let mut lut = vec![vec![0.0; cnt_y]; cnt_x];
    for i in 0..cnt_x {
        for j in 0..cnt_y {
            let mut acc = value(i, j);
            if i > 0 {
                acc += lut[i - 1][j];
            }
            if j > 0 {
                acc += lut[i][j - 1];
            }
            if i > 0 && j > 0 {
                acc -= lut[i - 1][j - 1];
            }
            lut[i][j] = acc;
        }
    }
    lut
}

fn query_prefix(lut: &[Vec<f64>], w: &BinWindow) -> f64 {
    let mut total = lut[w.ux][w.uy];
    if w.lx > 0 {
        total -= lut[w.lx - 1][w.uy];
    }
    if w.ly > 0 {
        total -= lut[w.ux][w.ly - 1];
    }
    if w.lx > 0 && w.ly > 0 {
        total += lut[w.lx - 1][w.ly - 1];
    }
    total
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

    fn circuit_with_grid() -> Circuit {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 40, 40), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        // A dense clump in the lower-left corner.
        for i in 0..16 {
            ckt.add_block(
                format!("m{i}"),
                ty,
                f64::from(i % 4),
                f64::from(i / 4),
                PlaceStatus::Unplaced,
            );
        }
        ckt
    }

    #[test]
    fn mesh_covers_region() {
        let ckt = circuit_with_grid();
        let mesh = GridMesh::new(&ckt, 4);
        assert!(mesh.cnt_x >= 1 && mesh.cnt_y >= 1);
        let full = mesh.full_window();
        let rect = mesh.window_rect(&full);
        assert_eq!(rect, Rect::new(0.0, 0.0, 40.0, 40.0));
    }

    #[test]
    fn white_space_lut_matches_naive_sum() {
        let mut ckt = circuit_with_grid();
        let ob = ckt.add_block_type(cell_type(10, 10));
        ckt.add_block("obst", ob, 10.0, 10.0, PlaceStatus::Fixed);
        let mesh = GridMesh::new(&ckt, 4);
        let w = mesh.full_window();
        let naive: f64 = mesh
            .bins
            .iter()
            .flat_map(|col| col.iter().map(|b| b.white_space))
            .sum();
        assert!((mesh.white_space_in(&w) - naive).abs() < 1e-6);
        // Total white space is the region minus the obstacle.
        assert!((naive - (1600.0 - 100.0)).abs() < 1e-6);
    }

    #[test]
    fn cell_area_lut_matches_naive_sum() {
        let ckt = circuit_with_grid();
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.7);
        let w = mesh.full_window();
        assert!((mesh.cell_area_in(&w) - 64.0).abs() < 1e-6);
    }

    #[test]
    fn partial_window_query() {
        let ckt = circuit_with_grid();
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.7);
        let w = BinWindow {
            lx: 0,
            ly: 0,
            ux: 0,
            uy: 0,
        };
        let naive = mesh.bins[0][0].cell_area;
        assert!((mesh.cell_area_in(&w) - naive).abs() < 1e-9);
    }

    #[test]
    fn overfill_detection_finds_dense_corner() {
        let ckt = circuit_with_grid();
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.3);
        let clusters = mesh.find_overfill_clusters();
        assert!(!clusters.is_empty());
        // The largest cluster carries the clump's area.
        assert!(clusters[0].total_cell_area > 0.0);
        for pair in clusters.windows(2) {
            assert!(pair[0].total_cell_area >= pair[1].total_cell_area);
        }
    }

    #[test]
    fn no_overfill_when_density_is_low() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 40, 40), Tech::default());
        let ty = ckt.add_block_type(cell_type(2, 2));
        ckt.add_block("a", ty, 5.0, 5.0, PlaceStatus::Unplaced);
        ckt.add_block("b", ty, 30.0, 30.0, PlaceStatus::Unplaced);
        let mut mesh = GridMesh::new(&ckt, 4);
        mesh.update_state(&ckt, 0.9);
        assert!(mesh.find_overfill_clusters().is_empty());
    }

    #[test]
    fn bin_index_clamps_outside_points() {
        let ckt = circuit_with_grid();
        let mesh = GridMesh::new(&ckt, 4);
        assert_eq!(mesh.bin_index_of(-5.0, -5.0), (0, 0));
        let (i, j) = mesh.bin_index_of(100.0, 100.0);
        assert_eq!(i, mesh.cnt_x - 1);
        assert_eq!(j, mesh.cnt_y - 1);
    }

    #[test]
    fn all_terminal_bin_marked() {
        let mut ckt = Circuit::new(RectInt::new(0, 0, 10, 10), Tech::default());
        let ob = ckt.add_block_type(cell_type(10, 10));
        ckt.add_block("obst", ob, 0.0, 0.0, PlaceStatus::Fixed);
        let mesh = GridMesh::new(&ckt, 4);
        assert!(mesh.bins.iter().flatten().all(|b| b.all_terminal));
    }
}
