//! Nets: weighted hyperedges over block pins.

use crate::ids::{BlockId, NetId};
use serde::{Deserialize, Serialize};

/// One endpoint of a net, carried by value.
///
/// `pin` indexes into the pin-offset list of the block's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPin {
    /// The block this endpoint attaches to.
    pub block: BlockId,
    /// The pin index within the block's type.
    pub pin: usize,
}

/// A weighted hyperedge connecting two or more pins.
///
/// The extreme-pin indices along each axis are cached and refreshed by
/// [`Circuit::update_net_extrema_x`](crate::Circuit::update_net_extrema_x)
/// before each quadratic problem build; `inv_p` caches `1/(p-1)` for the
/// bound-to-bound weight formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    /// The unique ID of this net.
    pub id: NetId,
    /// Net name.
    pub name: String,
    /// Net weight.
    pub weight: f64,
    /// The endpoints of this net.
    pub pins: Vec<NetPin>,
    /// Index into `pins` of the pin with the largest x coordinate.
    pub max_pin_x: usize,
    /// Index into `pins` of the pin with the smallest x coordinate.
    pub min_pin_x: usize,
    /// Index into `pins` of the pin with the largest y coordinate.
    pub max_pin_y: usize,
    /// Index into `pins` of the pin with the smallest y coordinate.
    pub min_pin_y: usize,
    /// Cached `1/(p-1)` where `p` is the pin count (zero when `p < 2`).
    pub inv_p: f64,
}

impl Net {
    /// Returns the pin count of this net.
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }
}
