#![warn(clippy::all)]

//! Road boundary detection for LIDAR point clouds
//!
//! Given a raw road scan, this crate recovers the geometric boundary points of the road
//! surface: a robust plane fit separates the ground from obstacles, iterative
//! elevation-band refinement narrows the ground down to the drivable surface,
//! density-based clustering splits the surface into semantic boundary segments and a
//! local-extrapolation loop grows the partially-detected far boundary along its natural
//! curve. The entry point is [find_road_bounds](crate::pipeline::find_road_bounds).

// The error taxonomy shared by all pipeline stages.
pub mod errors;
// Robust RANSAC ground plane estimation, in serial and parallel.
pub mod ground;
// Iterative elevation-band refinement of the ground subset down to the road surface.
pub mod refine;
// Density-based clustering of the road surface into semantic boundary segments.
pub mod cluster;
// Growth of a partially-detected boundary segment along its geometric trend.
pub mod extend;
// The end-to-end detection pipeline, from input file to boundary file.
pub mod pipeline;

pub use crate::errors::DetectionError;
pub use crate::pipeline::{find_road_bounds, find_road_bounds_with_params, RoadBoundsParams};
