//! Relay pagination over offset-addressed results.

mod slicer;

pub use slicer::{SliceArgs, SliceBounds, connection_from_slice, plan_window, slice_bounds};
