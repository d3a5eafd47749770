use std::collections::HashSet;
use std::path::PathBuf;

use las::Builder;
use nalgebra::Vector3;
use roadbound_algorithms::cluster::ClusterParams;
use roadbound_algorithms::extend::ExtendParams;
use roadbound_algorithms::ground::GroundParams;
use roadbound_algorithms::refine::RefineParams;
use roadbound_algorithms::{find_road_bounds_with_params, RoadBoundsParams};
use roadbound_io::PointCloud;

fn grid(x0: i32, x1: i32, y0: i32, y1: i32, z: f64) -> Vec<Vector3<f64>> {
    let mut points = vec![];
    for x in x0..=x1 {
        for y in y0..=y1 {
            points.push(Vector3::new(x as f64, y as f64, z));
        }
    }
    points
}

fn line(x0: i32, x1: i32, y: f64) -> Vec<Vector3<f64>> {
    (x0..=x1).map(|x| Vector3::new(x as f64, y, 0.0)).collect()
}

/// Flat terrain with a road strip running along x, an edge-point line on either side of
/// the strip and some elevated clutter. Returns the cloud and the expected boundary.
fn synthetic_scene() -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
    // drivable surface, 20 units wide
    let mut cloud = grid(0, 100, -10, 10, 0.0);
    // left edge line, detached from the strip
    let left = line(0, 100, 18.0);
    // right edge line, attached to the strip and broken at a crossing
    let near_right = line(0, 60, -12.0);
    let far_right = line(62, 100, -12.0);
    // sparse surrounding terrain
    for x in (0..=100).step_by(10) {
        for &y in &[-40.0, -30.0, 30.0, 40.0] {
            cloud.push(Vector3::new(x as f64, y, 0.0));
        }
    }
    // elevated clutter (vegetation, vehicles)
    for k in 0..12 {
        cloud.push(Vector3::new((k * 8) as f64, 25.0, 40.0 + k as f64));
    }

    let mut expected = vec![];
    expected.extend(left.iter().cloned());
    expected.extend(near_right.iter().cloned());
    expected.extend(far_right.iter().cloned());
    cloud.extend(left);
    cloud.extend(near_right);
    cloud.extend(far_right);
    (cloud, expected)
}

fn scene_params() -> RoadBoundsParams {
    RoadBoundsParams {
        ground: GroundParams {
            distance_threshold: 0.5,
            num_iterations: 200,
        },
        refine: RefineParams::default(),
        cluster: ClusterParams {
            coarse_eps: 4.0,
            coarse_min_samples: 5,
            fine_eps: 1.5,
            fine_min_samples: 3,
        },
        extend: ExtendParams {
            window_half_width: 20.0,
            search_radius: 1.5,
            num_probes: 5,
            min_new_points: 10,
        },
    }
}

fn write_cloud(positions: Vec<Vector3<f64>>, name: &str) -> PathBuf {
    let header = Builder::from((1, 2)).into_header().unwrap();
    let path = std::env::temp_dir().join(name);
    PointCloud::new(positions, header).write_to_path(&path).unwrap();
    path
}

/// The coordinates of both scenes are integer-valued, so they survive the LAS
/// quantization exactly and can be compared as integer keys.
fn coordinate_set(positions: &[Vector3<f64>]) -> HashSet<(i64, i64, i64)> {
    positions
        .iter()
        .map(|p| (p.x.round() as i64, p.y.round() as i64, p.z.round() as i64))
        .collect()
}

#[test]
fn recovers_both_edge_lines() {
    let (cloud, expected) = synthetic_scene();
    let input = write_cloud(cloud, "roadbound_scene_in.las");
    let output = std::env::temp_dir().join("roadbound_scene_out.las");

    find_road_bounds_with_params(&input, &output, &scene_params()).unwrap();

    let bound = PointCloud::from_path(&output).unwrap();
    std::fs::remove_file(&input).ok();
    std::fs::remove_file(&output).ok();

    assert_eq!(expected.len(), bound.len());
    assert_eq!(coordinate_set(&expected), coordinate_set(bound.positions()));
}

#[test]
fn too_few_points_leaves_no_output() {
    let input = write_cloud(
        vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 0.0)],
        "roadbound_tiny_in.las",
    );
    let output = std::env::temp_dir().join("roadbound_tiny_out.las");

    let result = find_road_bounds_with_params(&input, &output, &scene_params());
    std::fs::remove_file(&input).ok();

    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn missing_input_file_is_an_error() {
    let output = std::env::temp_dir().join("roadbound_missing_out.las");
    let result = find_road_bounds_with_params("/no/such/scan.las", &output, &scene_params());
    assert!(result.is_err());
    assert!(!output.exists());
}
