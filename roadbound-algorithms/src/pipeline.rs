use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use log::info;
use nalgebra::Vector3;
use roadbound_io::PointCloud;

use crate::cluster::{split_road_segments, ClusterParams};
use crate::extend::{coord_key, extend_boundary, ExtendParams};
use crate::ground::{ransac_ground, GroundParams};
use crate::refine::{refine_road_surface, RefineParams};

/// All tunable parameters of the detection pipeline.
///
/// The defaults are calibrated for scans with coordinates in the magnitude of raw LAS
/// integer units; scans in other units need the distance-like parameters rescaled.
#[derive(Debug, Clone, Default)]
pub struct RoadBoundsParams {
    pub ground: GroundParams,
    pub refine: RefineParams,
    pub cluster: ClusterParams,
    pub extend: ExtendParams,
}

/// Concatenates boundary segments into one point set, dropping exact duplicates.
/// Points keep their first-seen order; order carries no meaning downstream.
pub fn assemble_boundary(segments: &[&[Vector3<f64>]]) -> Vec<Vector3<f64>> {
    let mut seen = HashSet::new();
    let mut bound = Vec::new();
    for segment in segments {
        for point in *segment {
            if seen.insert(coord_key(point)) {
                bound.push(*point);
            }
        }
    }
    bound
}

/// Detects the road boundary in the LAS file at `input` and writes the boundary points
/// to a new LAS file at `output`, using the default [RoadBoundsParams].
pub fn find_road_bounds<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    find_road_bounds_with_params(input, output, &RoadBoundsParams::default())
}

/// Same as [find_road_bounds], with caller-supplied parameters.
///
/// Runs the full pipeline: robust ground plane estimation, iterative road surface
/// refinement, clustering into left / near-right / far-right boundary segments, growth
/// of the far-right segment, and assembly of the final boundary point set. The output
/// file is written with the header of the input file and only after every stage has
/// succeeded; a failing run leaves no partial output behind.
pub fn find_road_bounds_with_params<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    params: &RoadBoundsParams,
) -> Result<()> {
    let cloud = PointCloud::from_path(&input)?;
    info!(
        "Loaded {} points from {}",
        cloud.len(),
        input.as_ref().display()
    );

    let (_plane, ground_indices) = ransac_ground(cloud.positions(), &params.ground)?;
    let ground: Vec<Vector3<f64>> = ground_indices
        .iter()
        .map(|&index| cloud.positions()[index])
        .collect();
    info!(
        "Ground plane estimation kept {} of {} points",
        ground.len(),
        cloud.len()
    );

    let road = refine_road_surface(&ground, &params.refine)?;
    info!("Road surface refinement kept {} ground points", road.len());

    let segments = split_road_segments(&road, &params.cluster)?;
    info!(
        "Clustering separated {} left, {} near-right and {} far-right boundary points",
        segments.left.len(),
        segments.near_right.len(),
        segments.far_right.len()
    );

    let far_right = extend_boundary(&segments.far_right, &segments.right_body, &params.extend)?;
    info!(
        "Boundary extension grew the far-right segment from {} to {} points",
        segments.far_right.len(),
        far_right.len()
    );

    let bound = assemble_boundary(&[&segments.left, &segments.near_right, &far_right]);
    info!(
        "Writing {} boundary points to {}",
        bound.len(),
        output.as_ref().display()
    );
    cloud.with_positions(bound).write_to_path(&output)
}
