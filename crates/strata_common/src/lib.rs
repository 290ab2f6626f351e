//! Shared geometry primitives for the Strata placement engine.
//!
//! Every stage of the placer works on the same small vocabulary of shapes:
//! real-valued rectangles during global placement, integer rectangles and
//! 1-D segments during legalization. This crate owns those value types so
//! the circuit model and the engine crates agree on their semantics.

#![warn(missing_docs)]

mod geometry;

pub use geometry::{merge_segments, Rect, RectInt, SegmentInt};
