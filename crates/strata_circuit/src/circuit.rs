//! The circuit container: arenas of types, blocks, and nets.

use crate::block::{Block, Orientation, PlaceStatus};
use crate::block_type::BlockType;
use crate::ids::{BlockId, BlockTypeId, NetId};
use crate::net::{Net, NetPin};
use crate::tech::Tech;
use serde::{Deserialize, Serialize};
use strata_common::RectInt;

/// The design under placement.
///
/// Owns the block-type library, the block and net arenas, the placement
/// region, and the technology record. The placement engine has exclusive
/// mutator rights while a run is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    /// The placement region in grid units.
    pub region: RectInt,
    /// Technology parameters.
    pub tech: Tech,
    /// All block types.
    pub block_types: Vec<BlockType>,
    /// All blocks, including well-tap cells appended during legalization.
    pub blocks: Vec<Block>,
    /// All nets.
    pub nets: Vec<Net>,
    /// IDs of well-tap blocks inserted by the legalizer.
    pub well_tap_ids: Vec<BlockId>,
}

impl Circuit {
    /// Creates an empty circuit over the given region and technology.
    pub fn new(region: RectInt, tech: Tech) -> Self {
        Self {
            region,
            tech,
            block_types: Vec::new(),
            blocks: Vec::new(),
            nets: Vec::new(),
            well_tap_ids: Vec::new(),
        }
    }

    /// Adds a block type and returns its ID.
    pub fn add_block_type(&mut self, mut block_type: BlockType) -> BlockTypeId {
        let id = BlockTypeId::from_raw(self.block_types.len() as u32);
        block_type.id = id;
        self.block_types.push(block_type);
        id
    }

    /// Adds a block of the given type at `(llx, lly)` and returns its ID.
    ///
    /// Width and height are cached from the type.
    pub fn add_block(
        &mut self,
        name: impl Into<String>,
        type_id: BlockTypeId,
        llx: f64,
        lly: f64,
        status: PlaceStatus,
    ) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        let ty = &self.block_types[type_id.index()];
        self.blocks.push(Block {
            id,
            name: name.into(),
            type_id,
            llx,
            lly,
            width: ty.width,
            height: ty.height,
            status,
            orient: Orientation::N,
            nets: Vec::new(),
        });
        id
    }

    /// Adds a net over the given pins and returns its ID.
    ///
    /// Registers the net on every touched block and initializes the
    /// cached extreme-pin indices.
    pub fn add_net(
        &mut self,
        name: impl Into<String>,
        weight: f64,
        pins: Vec<NetPin>,
    ) -> NetId {
        let id = NetId::from_raw(self.nets.len() as u32);
        let p = pins.len();
        let inv_p = if p >= 2 { 1.0 / (p as f64 - 1.0) } else { 0.0 };
        for pin in &pins {
            self.blocks[pin.block.index()].nets.push(id);
        }
        self.nets.push(Net {
            id,
            name: name.into(),
            weight,
            pins,
            max_pin_x: 0,
            min_pin_x: 0,
            max_pin_y: 0,
            min_pin_y: 0,
            inv_p,
        });
        self.update_net_extrema_x(id);
        self.update_net_extrema_y(id);
        id
    }

    /// Appends a well-tap block of the given type and records its ID.
    ///
    /// Tap cells live in the main block arena so cluster sweeps move them
    /// uniformly with standard cells.
    pub fn add_well_tap(
        &mut self,
        name: impl Into<String>,
        type_id: BlockTypeId,
    ) -> BlockId {
        let id = self.add_block(name, type_id, 0.0, 0.0, PlaceStatus::Placed);
        self.well_tap_ids.push(id);
        id
    }

    /// Returns the block with the given ID.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Returns a mutable reference to the block with the given ID.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Returns the net with the given ID.
    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    /// Returns the block type with the given ID.
    pub fn block_type(&self, id: BlockTypeId) -> &BlockType {
        &self.block_types[id.index()]
    }

    /// Returns the type of the given block.
    pub fn type_of(&self, id: BlockId) -> &BlockType {
        self.block_type(self.block(id).type_id)
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Returns the number of movable blocks.
    pub fn movable_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_movable()).count()
    }

    /// Returns the left edge of the placement region.
    pub fn left(&self) -> i32 {
        self.region.llx
    }

    /// Returns the right edge of the placement region.
    pub fn right(&self) -> i32 {
        self.region.urx
    }

    /// Returns the bottom edge of the placement region.
    pub fn bottom(&self) -> i32 {
        self.region.lly
    }

    /// Returns the top edge of the placement region.
    pub fn top(&self) -> i32 {
        self.region.ury
    }

    /// Returns the region width.
    pub fn region_width(&self) -> i32 {
        self.region.width()
    }

    /// Returns the region height.
    pub fn region_height(&self) -> i32 {
        self.region.height()
    }

    /// Returns the average width of movable blocks (1.0 if there are none).
    pub fn average_movable_width(&self) -> f64 {
        self.average_movable(|b| f64::from(b.width))
    }

    /// Returns the average height of movable blocks (1.0 if there are none).
    pub fn average_movable_height(&self) -> f64 {
        self.average_movable(|b| f64::from(b.height))
    }

    fn average_movable(&self, dim: impl Fn(&Block) -> f64) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for b in self.blocks.iter().filter(|b| b.is_movable()) {
            sum += dim(b);
            count += 1;
        }
        if count == 0 {
            1.0
        } else {
            sum / count as f64
        }
    }

    /// Returns the smallest movable block width (1 if there are none).
    pub fn min_movable_width(&self) -> i32 {
        self.blocks
            .iter()
            .filter(|b| b.is_movable())
            .map(|b| b.width)
            .min()
            .unwrap_or(1)
    }

    /// Returns the smallest movable block height (1 if there are none).
    pub fn min_movable_height(&self) -> i32 {
        self.blocks
            .iter()
            .filter(|b| b.is_movable())
            .map(|b| b.height)
            .min()
            .unwrap_or(1)
    }

    /// Returns the largest movable block width (0 if there are none).
    pub fn max_movable_width(&self) -> i32 {
        self.blocks
            .iter()
            .filter(|b| b.is_movable())
            .map(|b| b.width)
            .max()
            .unwrap_or(0)
    }

    /// Returns the largest movable block height (0 if there are none).
    pub fn max_movable_height(&self) -> i32 {
        self.blocks
            .iter()
            .filter(|b| b.is_movable())
            .map(|b| b.height)
            .max()
            .unwrap_or(0)
    }

    /// Returns the total area of movable blocks.
    pub fn total_movable_area(&self) -> i64 {
        self.blocks
            .iter()
            .filter(|b| b.is_movable())
            .map(|b| b.area())
            .sum()
    }

    /// Returns the absolute x coordinate of a net pin.
    pub fn pin_x(&self, pin: &NetPin) -> f64 {
        let block = self.block(pin.block);
        let ty = self.block_type(block.type_id);
        block.llx + ty.pins[pin.pin].dx
    }

    /// Returns the absolute y coordinate of a net pin.
    pub fn pin_y(&self, pin: &NetPin) -> f64 {
        let block = self.block(pin.block);
        let ty = self.block_type(block.type_id);
        block.lly + ty.pins[pin.pin].dy
    }

    /// Refreshes the cached extreme-pin indices of a net along x.
    ///
    /// Ties keep the earliest pin, which makes triplet assembly stable.
    pub fn update_net_extrema_x(&mut self, id: NetId) {
        let net = &self.nets[id.index()];
        if net.pins.len() < 2 {
            return;
        }
        let mut max_idx = 0usize;
        let mut min_idx = 0usize;
        let mut max_x = self.pin_x(&net.pins[0]);
        let mut min_x = max_x;
        for (i, pin) in net.pins.iter().enumerate().skip(1) {
            let x = self.pin_x(pin);
            if x > max_x {
                max_x = x;
                max_idx = i;
            }
            if x < min_x {
                min_x = x;
                min_idx = i;
            }
        }
        let net = &mut self.nets[id.index()];
        net.max_pin_x = max_idx;
        net.min_pin_x = min_idx;
    }

    /// Refreshes the cached extreme-pin indices of a net along y.
    pub fn update_net_extrema_y(&mut self, id: NetId) {
        let net = &self.nets[id.index()];
        if net.pins.len() < 2 {
            return;
        }
        let mut max_idx = 0usize;
        let mut min_idx = 0usize;
        let mut max_y = self.pin_y(&net.pins[0]);
        let mut min_y = max_y;
        for (i, pin) in net.pins.iter().enumerate().skip(1) {
            let y = self.pin_y(pin);
            if y > max_y {
                max_y = y;
                max_idx = i;
            }
            if y < min_y {
                min_y = y;
                min_idx = i;
            }
        }
        let net = &mut self.nets[id.index()];
        net.max_pin_y = max_idx;
        net.min_pin_y = min_idx;
    }

    /// Refreshes the cached extreme-pin indices of every net along x.
    pub fn update_all_net_extrema_x(&mut self) {
        for i in 0..self.nets.len() {
            self.update_net_extrema_x(NetId::from_raw(i as u32));
        }
    }

    /// Refreshes the cached extreme-pin indices of every net along y.
    pub fn update_all_net_extrema_y(&mut self) {
        for i in 0..self.nets.len() {
            self.update_net_extrema_y(NetId::from_raw(i as u32));
        }
    }

    /// Returns the x half-perimeter of a net's bounding box.
    pub fn net_hpwl_x(&self, id: NetId) -> f64 {
        let net = self.net(id);
        if net.pins.len() < 2 {
            return 0.0;
        }
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        for pin in &net.pins {
            let x = self.pin_x(pin);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
        }
        max_x - min_x
    }

    /// Returns the y half-perimeter of a net's bounding box.
    pub fn net_hpwl_y(&self, id: NetId) -> f64 {
        let net = self.net(id);
        if net.pins.len() < 2 {
            return 0.0;
        }
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for pin in &net.pins {
            let y = self.pin_y(pin);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        max_y - min_y
    }

    /// Returns the total half-perimeter wire length along x.
    pub fn hpwl_x(&self) -> f64 {
        (0..self.nets.len())
            .map(|i| self.net_hpwl_x(NetId::from_raw(i as u32)))
            .sum()
    }

    /// Returns the total half-perimeter wire length along y.
    pub fn hpwl_y(&self) -> f64 {
        (0..self.nets.len())
            .map(|i| self.net_hpwl_y(NetId::from_raw(i as u32)))
            .sum()
    }

    /// Returns the total half-perimeter wire length.
    pub fn hpwl(&self) -> f64 {
        self.hpwl_x() + self.hpwl_y()
    }
}
