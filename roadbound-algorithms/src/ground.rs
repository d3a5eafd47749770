use nalgebra::Vector3;
use rand::Rng;
use rayon::prelude::*;

use crate::errors::DetectionError;

/// Minimum number of points needed to fit a plane
pub const MIN_PLANE_POINTS: usize = 3;

/// Parameters for the robust ground plane fit
#[derive(Debug, Clone)]
pub struct GroundParams {
    /// Maximum point-to-plane distance at which a point still counts as a ground inlier.
    /// Scale-dependent, in the units of the input coordinates.
    pub distance_threshold: f64,
    /// Number of random plane hypotheses to evaluate
    pub num_iterations: usize,
}

impl Default for GroundParams {
    fn default() -> Self {
        Self {
            distance_threshold: 5.0,
            num_iterations: 100,
        }
    }
}

/// Represents a plane in coordinate-form: ax + by + cz + d = 0.
/// The ranking shows how many points of the cloud are inliers for this specific plane.
#[derive(Debug, Clone)]
pub struct Plane {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    ranking: usize,
}

impl Plane {
    /// Number of inliers this plane was ranked with
    pub fn ranking(&self) -> usize {
        self.ranking
    }
}

/// calculates the distance between a point and a plane
fn distance_point_plane(point: &Vector3<f64>, plane: &Plane) -> f64 {
    let d = (plane.a * point.x + plane.b * point.y + plane.c * point.z + plane.d).abs();
    let e = (plane.a * plane.a + plane.b * plane.b + plane.c * plane.c).sqrt();
    d / e
}

/// generates a random plane from three distinct points of the cloud
fn generate_rng_plane(points: &[Vector3<f64>]) -> Plane {
    let mut rng = rand::thread_rng();
    let rand1 = rng.gen_range(0..points.len());
    let mut rand2 = rng.gen_range(0..points.len());
    while rand1 == rand2 {
        rand2 = rng.gen_range(0..points.len());
    }
    let mut rand3 = rng.gen_range(0..points.len());
    // make sure we have 3 unique random indices to generate the plane model
    while rand2 == rand3 || rand1 == rand3 {
        rand3 = rng.gen_range(0..points.len());
    }
    let p_a = points[rand1];
    let p_b = points[rand2];
    let p_c = points[rand3];

    // compute plane from the three positions; a collinear sample has a zero
    // normal and ranks no inliers
    let vec1 = p_b - p_a;
    let vec2 = p_c - p_a;
    let normal = vec1.cross(&vec2);
    let d = -normal.dot(&p_a);
    Plane {
        a: normal.x,
        b: normal.y,
        c: normal.z,
        d,
        ranking: 0,
    }
}

fn generate_plane_model(points: &[Vector3<f64>], distance_threshold: f64) -> (Plane, Vec<usize>) {
    let mut curr_hypo = generate_rng_plane(points);
    // find all points that belong to the plane
    let mut curr_positions = vec![];
    for (index, p) in points.iter().enumerate() {
        let distance = distance_point_plane(p, &curr_hypo);
        if distance < distance_threshold {
            curr_hypo.ranking += 1;
            curr_positions.push(index);
        }
    }
    (curr_hypo, curr_positions)
}

fn validate_model(
    best: Option<(Plane, Vec<usize>)>,
) -> Result<(Plane, Vec<usize>), DetectionError> {
    let best = best.ok_or_else(|| DetectionError::DegenerateFit {
        stage: "ground plane estimation",
        details: "no RANSAC iterations were run".into(),
    })?;
    if best.1.len() < MIN_PLANE_POINTS {
        return Err(DetectionError::DegenerateFit {
            stage: "ground plane estimation",
            details: format!("best hypothesis ranked only {} inlier(s)", best.1.len()),
        });
    }
    Ok(best)
}

/// Robust ground plane estimation over the full point cloud.
///
/// Evaluates `num_iterations` random plane hypotheses and returns the one with the most
/// inliers, together with the inlier indices (the "ground subset"). Obstacles such as
/// vegetation, vehicles and structures end up outside the `distance_threshold` and are
/// dropped, which a plain least-squares fit over the whole cloud would not achieve.
///
/// # Errors
///
/// [DetectionError::NotEnoughPoints] if the cloud holds fewer than [MIN_PLANE_POINTS]
/// points, [DetectionError::DegenerateFit] if no hypothesis reaches [MIN_PLANE_POINTS]
/// inliers (e.g. an all-collinear cloud).
pub fn ransac_ground(
    points: &[Vector3<f64>],
    params: &GroundParams,
) -> Result<(Plane, Vec<usize>), DetectionError> {
    if points.len() < MIN_PLANE_POINTS {
        return Err(DetectionError::NotEnoughPoints {
            stage: "ground plane estimation",
            found: points.len(),
            required: MIN_PLANE_POINTS,
        });
    }
    validate_model(
        (0..params.num_iterations)
            .map(|_x| generate_plane_model(points, params.distance_threshold))
            // keep the plane-model with the highest ranking
            .max_by(|(x, _y), (a, _b)| x.ranking.cmp(&a.ranking)),
    )
}

/// Same as [ransac_ground], with the hypotheses evaluated in parallel.
pub fn ransac_ground_par(
    points: &[Vector3<f64>],
    params: &GroundParams,
) -> Result<(Plane, Vec<usize>), DetectionError> {
    if points.len() < MIN_PLANE_POINTS {
        return Err(DetectionError::NotEnoughPoints {
            stage: "ground plane estimation",
            found: points.len(),
            required: MIN_PLANE_POINTS,
        });
    }
    validate_model(
        (0..params.num_iterations)
            .into_par_iter()
            .map(|_x| generate_plane_model(points, params.distance_threshold))
            // keep the plane-model with the highest ranking
            .max_by(|(x, _y), (a, _b)| x.ranking.cmp(&a.ranking)),
    )
}
