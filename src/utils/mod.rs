//! Shared utilities.
//!
//! Small helpers that are used by more than one stage of the pipeline.

mod math;

pub use math::{mul_inverse, rotate_left, rotate_right, width_mask};
