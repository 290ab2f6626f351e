//! Circuit model for the Strata placement engine.
//!
//! This crate is the engine's view of the design under placement: an
//! indexed arena of [`BlockType`]s (cell geometry, pin offsets, well
//! descriptors), [`Block`]s (instances with mutable coordinates and
//! placement status), [`Net`]s (weighted hyperedges over block pins),
//! and a [`Tech`] record (well design rules, row height, tap cell,
//! manufacturing scale factors). File parsing lives outside; the engine
//! consumes and mutates this model through the [`Circuit`] container.

#![warn(missing_docs)]

mod block;
mod block_type;
mod circuit;
mod ids;
mod net;
mod tech;

pub use block::{Block, Orientation, PlaceStatus};
pub use block_type::{BlockType, PinOffset, WellInfo};
pub use circuit::Circuit;
pub use ids::{BlockId, BlockTypeId, NetId};
pub use net::{Net, NetPin};
pub use tech::Tech;
