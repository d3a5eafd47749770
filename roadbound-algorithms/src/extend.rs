use std::collections::HashSet;

use float_ord::FloatOrd;
use kd_tree::KdMap;
use log::debug;
use nalgebra::Vector3;

use crate::errors::DetectionError;

/// Parameters for growing a partially-detected boundary segment
#[derive(Debug, Clone)]
pub struct ExtendParams {
    /// Half-width of the square training window around the extremal point
    pub window_half_width: f64,
    /// Radius of the neighbor search around each probe point
    pub search_radius: f64,
    /// Number of probe points sampled ahead of the extremal point, spread over half the
    /// window width
    pub num_probes: usize,
    /// Growth saturates when an iteration contributes fewer new points than this
    pub min_new_points: usize,
}

impl Default for ExtendParams {
    fn default() -> Self {
        Self {
            window_half_width: 70.0,
            search_radius: 10.0,
            num_probes: 5,
            min_new_points: 10,
        }
    }
}

/// Exact-coordinate identity of a point, used for set membership
pub(crate) type CoordKey = (FloatOrd<f64>, FloatOrd<f64>, FloatOrd<f64>);

pub(crate) fn coord_key(p: &Vector3<f64>) -> CoordKey {
    (FloatOrd(p.x), FloatOrd(p.y), FloatOrd(p.z))
}

/// A line y = slope * x + intercept fit by ordinary least squares
struct RegressionLine {
    slope: f64,
    intercept: f64,
}

impl RegressionLine {
    fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

fn fit_regression_line(window: &[&Vector3<f64>]) -> Result<RegressionLine, DetectionError> {
    if window.len() < 2 {
        return Err(DetectionError::DegenerateFit {
            stage: "boundary extension",
            details: format!(
                "local window holds {} point(s), need at least 2",
                window.len()
            ),
        });
    }
    let n = window.len() as f64;
    let sx: f64 = window.iter().map(|p| p.x).sum();
    let sy: f64 = window.iter().map(|p| p.y).sum();
    let sxx: f64 = window.iter().map(|p| p.x * p.x).sum();
    let sxy: f64 = window.iter().map(|p| p.x * p.y).sum();
    let denominator = n * sxx - sx * sx;
    if denominator.abs() < 1e-12 {
        return Err(DetectionError::DegenerateFit {
            stage: "boundary extension",
            details: "all local window points share one x coordinate".into(),
        });
    }
    let slope = (n * sxy - sx * sy) / denominator;
    Ok(RegressionLine {
        slope,
        intercept: (sy - slope * sx) / n,
    })
}

/// Grows a partially-detected boundary segment through the `region` it was carved from,
/// following the local geometric trend of the boundary in the xy projection.
///
/// Each iteration takes the extremal segment point along the growth axis (maximal x),
/// fits a line to the region points in a square window around it, predicts a handful of
/// probe positions ahead along the line and merges every region point within
/// `search_radius` of a probe into the segment. Re-fitting at every step follows the
/// curvature of the boundary, while anchoring growth to the actual point density keeps
/// the extrapolation from running into empty space.
///
/// Growth saturates (normal termination, not an error) when an iteration finds fewer
/// than `min_new_points` region points that are not yet part of the segment, or when all
/// probe positions leave the bounding extent of the region. The sub-threshold batch is
/// not merged, so re-running on a saturated segment returns it unchanged.
///
/// # Errors
///
/// [DetectionError::NotEnoughPoints] for an empty segment or a region too small to
/// support a neighbor index, [DetectionError::DegenerateFit] when a local window cannot
/// support the line fit.
pub fn extend_boundary(
    segment: &[Vector3<f64>],
    region: &[Vector3<f64>],
    params: &ExtendParams,
) -> Result<Vec<Vector3<f64>>, DetectionError> {
    if segment.is_empty() {
        return Err(DetectionError::NotEnoughPoints {
            stage: "boundary extension",
            found: 0,
            required: 1,
        });
    }
    if region.len() < 2 {
        return Err(DetectionError::NotEnoughPoints {
            stage: "boundary extension region",
            found: region.len(),
            required: 2,
        });
    }

    // The neighbor index and the region extent live only for this invocation
    let tree: KdMap<[f64; 2], usize> = KdMap::build_by_ordered_float(
        region
            .iter()
            .enumerate()
            .map(|(index, p)| ([p.x, p.y], index))
            .collect(),
    );
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;
    for p in region {
        if p.x < min_x {
            min_x = p.x;
        }
        if p.x > max_x {
            max_x = p.x;
        }
        if p.y < min_y {
            min_y = p.y;
        }
        if p.y > max_y {
            max_y = p.y;
        }
    }

    let mut grown: Vec<Vector3<f64>> = segment.to_vec();
    let mut members: HashSet<CoordKey> = grown.iter().map(coord_key).collect();
    let probe_spacing = params.window_half_width / (2.0 * params.num_probes as f64);

    loop {
        let p0 = *grown
            .iter()
            .max_by_key(|p| FloatOrd(p.x))
            .expect("segment is never empty");

        let window: Vec<&Vector3<f64>> = region
            .iter()
            .filter(|p| {
                (p.x - p0.x).abs() < params.window_half_width
                    && (p.y - p0.y).abs() < params.window_half_width
            })
            .collect();
        let line = fit_regression_line(&window)?;

        let probes: Vec<(f64, f64)> = (0..params.num_probes)
            .map(|i| {
                let x = p0.x + i as f64 * probe_spacing;
                (x, line.predict(x))
            })
            .collect();
        if probes
            .iter()
            .all(|&(x, y)| x < min_x || x > max_x || y < min_y || y > max_y)
        {
            debug!("boundary extension saturated: all probe points left the region extent");
            break;
        }

        let mut fresh_keys = HashSet::new();
        let mut fresh = Vec::new();
        for &(x, y) in &probes {
            for item in tree.within_radius(&[x, y], params.search_radius) {
                let index = item.1;
                let key = coord_key(&region[index]);
                if !members.contains(&key) && fresh_keys.insert(key) {
                    fresh.push(index);
                }
            }
        }
        if fresh.len() < params.min_new_points {
            debug!(
                "boundary extension saturated: {} new point(s), threshold is {}",
                fresh.len(),
                params.min_new_points
            );
            break;
        }

        members.extend(fresh_keys);
        grown.extend(fresh.iter().map(|&index| region[index]));
    }

    Ok(grown)
}
