use nalgebra::{Matrix3, Vector3};

use crate::errors::DetectionError;
use crate::ground::MIN_PLANE_POINTS;

/// Parameters for the iterative road surface refinement
#[derive(Debug, Clone)]
pub struct RefineParams {
    /// Width of the coarse first elevation band above the lowest ground point
    pub initial_band: f64,
    /// Decreasing elevation tolerances, one refit pass each
    pub tolerance_schedule: Vec<f64>,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            initial_band: 35.0,
            tolerance_schedule: vec![25.0, 20.0, 15.0, 10.0, 5.0],
        }
    }
}

/// A plane z = a*x + b*y + c fit by ordinary least squares
#[derive(Debug, Clone, Copy)]
pub struct RegressionPlane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl RegressionPlane {
    /// Predicted elevation at (x, y)
    pub fn predict(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }
}

/// Fits the plane z = a*x + b*y + c to `points` by solving the normal equations.
///
/// # Errors
///
/// [DetectionError::NotEnoughPoints] for fewer than [MIN_PLANE_POINTS] points,
/// [DetectionError::DegenerateFit] if the system is singular (the xy projections of the
/// points do not span a plane).
pub fn fit_regression_plane(points: &[Vector3<f64>]) -> Result<RegressionPlane, DetectionError> {
    if points.len() < MIN_PLANE_POINTS {
        return Err(DetectionError::NotEnoughPoints {
            stage: "plane regression",
            found: points.len(),
            required: MIN_PLANE_POINTS,
        });
    }

    let n = points.len() as f64;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sz = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    let mut sxz = 0.0;
    let mut syz = 0.0;
    for p in points {
        sx += p.x;
        sy += p.y;
        sz += p.z;
        sxx += p.x * p.x;
        sxy += p.x * p.y;
        syy += p.y * p.y;
        sxz += p.x * p.z;
        syz += p.y * p.z;
    }

    let normal = Matrix3::new(sxx, sxy, sx, sxy, syy, sy, sx, sy, n);
    let rhs = Vector3::new(sxz, syz, sz);
    normal
        .lu()
        .solve(&rhs)
        .map(|w| RegressionPlane {
            a: w.x,
            b: w.y,
            c: w.z,
        })
        .ok_or_else(|| DetectionError::DegenerateFit {
            stage: "plane regression",
            details: "singular normal equations, the points do not span a plane".into(),
        })
}

/// Iteratively narrows the ground subset down to the points on the drivable road surface.
///
/// The first candidate set is everything within `initial_band` above the lowest ground
/// point. Each pass then refits a plane to the current candidates, predicts the elevation
/// over the whole ground subset and recomputes the candidates as the points at or below
/// the prediction plus the pass tolerance. Anchoring every refit on the previous, narrower
/// candidate set progressively sheds curbs, shoulders and parked objects while the
/// shrinking tolerance converges on the road plane.
///
/// The candidate set is recomputed from the full ground subset in every pass, so the
/// result is always a subset of `ground`.
///
/// # Errors
///
/// [DetectionError::DegenerateFit] when a pass leaves too few candidates for the next fit
/// or the fit itself is singular; the diagnostic names the failing pass.
pub fn refine_road_surface(
    ground: &[Vector3<f64>],
    params: &RefineParams,
) -> Result<Vec<Vector3<f64>>, DetectionError> {
    if ground.len() < MIN_PLANE_POINTS {
        return Err(DetectionError::NotEnoughPoints {
            stage: "road surface refinement",
            found: ground.len(),
            required: MIN_PLANE_POINTS,
        });
    }

    let min_z = ground.iter().map(|p| p.z).fold(f64::MAX, f64::min);
    let mut road: Vec<Vector3<f64>> = ground
        .iter()
        .filter(|p| p.z < min_z + params.initial_band)
        .cloned()
        .collect();

    for (pass, &tolerance) in params.tolerance_schedule.iter().enumerate() {
        if road.len() < MIN_PLANE_POINTS {
            return Err(DetectionError::DegenerateFit {
                stage: "road surface refinement",
                details: format!(
                    "pass {} (tolerance {}): only {} candidate point(s) left",
                    pass + 1,
                    tolerance,
                    road.len()
                ),
            });
        }
        let plane = fit_regression_plane(&road).map_err(|source| DetectionError::DegenerateFit {
            stage: "road surface refinement",
            details: format!("pass {} (tolerance {}): {}", pass + 1, tolerance, source),
        })?;
        road = ground
            .iter()
            .filter(|p| p.z <= plane.predict(p.x, p.y) + tolerance)
            .cloned()
            .collect();
    }

    Ok(road)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// Flat road at z = 0 with elevated clutter at z = 30, evenly spread so the
    /// mixture fit stays level
    fn setup_ground() -> Vec<Vector3<f64>> {
        let mut ground = vec![];
        for x in 0..20 {
            for y in 0..20 {
                ground.push(Vector3::new(x as f64, y as f64, 0.0));
            }
        }
        for x in 0..5 {
            for y in 0..5 {
                ground.push(Vector3::new((x * 4) as f64, (y * 4) as f64, 30.0));
            }
        }
        ground
    }

    #[test]
    fn regression_plane_recovers_a_tilted_plane() {
        let points: Vec<_> = (0..100)
            .map(|i| {
                let x = (i % 10) as f64;
                let y = (i / 10) as f64;
                Vector3::new(x, y, 2.0 * x - 0.5 * y + 3.0)
            })
            .collect();
        let plane = fit_regression_plane(&points).unwrap();
        assert_approx_eq!(2.0, plane.a, 1e-9);
        assert_approx_eq!(-0.5, plane.b, 1e-9);
        assert_approx_eq!(3.0, plane.c, 1e-9);
    }

    #[test]
    fn regression_plane_is_degenerate_without_xy_spread() {
        let points: Vec<_> = (0..10).map(|i| Vector3::new(1.0, 2.0, i as f64)).collect();
        let err = fit_regression_plane(&points).unwrap_err();
        assert!(matches!(err, DetectionError::DegenerateFit { .. }));
    }

    #[test]
    fn refinement_sheds_elevated_clutter() {
        let ground = setup_ground();
        let road = refine_road_surface(&ground, &RefineParams::default()).unwrap();
        assert_eq!(400, road.len());
        assert!(road.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn road_subset_is_a_subset_of_the_ground() {
        let ground = setup_ground();
        let road = refine_road_surface(&ground, &RefineParams::default()).unwrap();
        for p in &road {
            assert!(ground.contains(p));
        }
    }

    #[test]
    fn road_elevation_stays_inside_the_first_band() {
        let ground = setup_ground();
        let params = RefineParams::default();
        let road = refine_road_surface(&ground, &params).unwrap();
        let min_z = ground.iter().map(|p| p.z).fold(f64::MAX, f64::min);
        let max_road_z = road.iter().map(|p| p.z).fold(f64::MIN, f64::max);
        assert!(max_road_z >= min_z);
        assert!(max_road_z <= min_z + params.initial_band);
    }

    #[test]
    fn too_few_ground_points_is_an_error() {
        let ground = vec![Vector3::new(0.0, 0.0, 0.0)];
        let err = refine_road_surface(&ground, &RefineParams::default()).unwrap_err();
        assert!(matches!(err, DetectionError::NotEnoughPoints { .. }));
    }

    #[test]
    fn degenerate_pass_names_the_pass() {
        // All candidates share one xy column, so the first refit is singular
        let ground: Vec<_> = (0..10).map(|i| Vector3::new(3.0, 4.0, i as f64)).collect();
        let err = refine_road_surface(&ground, &RefineParams::default()).unwrap_err();
        match err {
            DetectionError::DegenerateFit { details, .. } => {
                assert!(details.contains("pass 1"))
            }
            other => panic!("expected a degenerate fit, got {:?}", other),
        }
    }
}
