use float_ord::FloatOrd;
use kd_tree::KdMap;
use log::debug;
use nalgebra::Vector3;

use crate::errors::DetectionError;

/// Label assigned to points that belong to no cluster
pub const NOISE: i32 = -1;

/// Parameters for the two clustering passes that separate the boundary segments
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Neighborhood radius of the coarse pass over the whole road subset
    pub coarse_eps: f64,
    /// Minimum neighbor count for a core point in the coarse pass
    pub coarse_min_samples: usize,
    /// Neighborhood radius of the fine pass over the right-side body
    pub fine_eps: f64,
    /// Minimum neighbor count for a core point in the fine pass
    pub fine_min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            coarse_eps: 50.0,
            coarse_min_samples: 20,
            fine_eps: 5.0,
            fine_min_samples: 10,
        }
    }
}

/// The semantic road segments separated by the two clustering passes
#[derive(Debug, Clone)]
pub struct RoadSegments {
    /// The left road boundary
    pub left: Vec<Vector3<f64>>,
    /// The near part of the right road boundary
    pub near_right: Vec<Vector3<f64>>,
    /// The far part of the right road boundary; usually only partially detected and
    /// grown afterwards by boundary extension
    pub far_right: Vec<Vector3<f64>>,
    /// The whole right-side body the right boundaries were carved from, kept as the
    /// surrounding region for boundary extension
    pub right_body: Vec<Vector3<f64>>,
}

/// Density-based clustering over 3D points.
///
/// Returns one label per point: clusters are numbered from 0 in discovery order, sparse
/// points are labeled [NOISE]. Labels are an artifact of a single invocation and carry no
/// meaning across invocations or inputs.
pub fn dbscan(points: &[Vector3<f64>], eps: f64, min_samples: usize) -> Vec<i32> {
    let mut labels = vec![NOISE; points.len()];
    if points.is_empty() {
        return labels;
    }

    let tree: KdMap<[f64; 3], usize> = KdMap::build_by_ordered_float(
        points
            .iter()
            .enumerate()
            .map(|(index, p)| ([p.x, p.y, p.z], index))
            .collect(),
    );

    let mut visited = vec![false; points.len()];
    let mut cluster_id = 0;
    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        let p = &points[start];
        let neighbors = tree.within_radius(&[p.x, p.y, p.z], eps);
        if neighbors.len() < min_samples {
            // stays noise unless a later cluster adopts it as a border point
            continue;
        }

        labels[start] = cluster_id;
        let mut seeds: Vec<usize> = neighbors.iter().map(|item| item.1).collect();
        let mut head = 0;
        while head < seeds.len() {
            let current = seeds[head];
            head += 1;

            if labels[current] == NOISE {
                labels[current] = cluster_id;
            }
            if !visited[current] {
                visited[current] = true;
                labels[current] = cluster_id;

                let q = &points[current];
                let current_neighbors = tree.within_radius(&[q.x, q.y, q.z], eps);
                if current_neighbors.len() >= min_samples {
                    seeds.extend(current_neighbors.iter().map(|item| item.1));
                }
            }
        }
        cluster_id += 1;
    }

    labels
}

/// Groups point indices by cluster label, ignoring noise
fn collect_clusters(labels: &[i32]) -> Vec<Vec<usize>> {
    let cluster_count = labels.iter().copied().max().unwrap_or(NOISE) + 1;
    let mut clusters = vec![Vec::new(); cluster_count as usize];
    for (index, &label) in labels.iter().enumerate() {
        if label != NOISE {
            clusters[label as usize].push(index);
        }
    }
    clusters
}

fn centroid(points: &[Vector3<f64>], indices: &[usize]) -> Vector3<f64> {
    let sum: Vector3<f64> = indices.iter().map(|&i| points[i]).sum();
    sum / indices.len() as f64
}

/// Partitions the road subset into the semantic boundary segments.
///
/// A coarse pass separates the left boundary from the broad right-side body, a fine pass
/// over the body alone subdivides it into the near-right and far-right boundaries.
///
/// Which cluster is which is decided geometrically, never by raw label value (label
/// assignment order is an artifact of the clustering run): the right-side body is the
/// cluster with the most points; the left boundary is every other coarse cluster with its
/// centroid on the +y side of the body; in the fine pass the largest cluster is the body
/// interior, the remaining clusters on the -y side of the interior are the right road
/// edge, and among those the one reaching farthest along +x is the far-right boundary.
///
/// # Errors
///
/// [DetectionError::ClusterSelection] when any of the four segments cannot be identified;
/// a segment is never silently substituted by an empty one.
pub fn split_road_segments(
    road: &[Vector3<f64>],
    params: &ClusterParams,
) -> Result<RoadSegments, DetectionError> {
    let labels = dbscan(road, params.coarse_eps, params.coarse_min_samples);
    let clusters = collect_clusters(&labels);
    debug!("coarse pass separated {} cluster(s)", clusters.len());
    if clusters.is_empty() {
        return Err(DetectionError::ClusterSelection {
            segment: "right-side road body",
            candidates: 0,
        });
    }

    // The dominant cluster is the road mass the right boundaries are carved from
    let body_label = clusters
        .iter()
        .enumerate()
        .max_by_key(|(_, cluster)| cluster.len())
        .map(|(label, _)| label)
        .expect("clusters is not empty");
    let body_centroid = centroid(road, &clusters[body_label]);

    let mut left = Vec::new();
    for (label, cluster) in clusters.iter().enumerate() {
        if label != body_label && centroid(road, cluster).y > body_centroid.y {
            left.extend(cluster.iter().map(|&i| road[i]));
        }
    }
    if left.is_empty() {
        return Err(DetectionError::ClusterSelection {
            segment: "left boundary",
            candidates: clusters.len(),
        });
    }

    let right_body: Vec<Vector3<f64>> = clusters[body_label].iter().map(|&i| road[i]).collect();

    let fine_labels = dbscan(&right_body, params.fine_eps, params.fine_min_samples);
    let fine_clusters = collect_clusters(&fine_labels);
    debug!(
        "fine pass separated the right-side body into {} cluster(s)",
        fine_clusters.len()
    );
    if fine_clusters.is_empty() {
        return Err(DetectionError::ClusterSelection {
            segment: "right boundary",
            candidates: 0,
        });
    }

    let interior_label = fine_clusters
        .iter()
        .enumerate()
        .max_by_key(|(_, cluster)| cluster.len())
        .map(|(label, _)| label)
        .expect("fine_clusters is not empty");
    let interior_centroid = centroid(&right_body, &fine_clusters[interior_label]);

    // The right road edge sits below the body interior
    let mut candidates: Vec<&Vec<usize>> = fine_clusters
        .iter()
        .enumerate()
        .filter(|&(label, cluster)| {
            label != interior_label && centroid(&right_body, cluster).y < interior_centroid.y
        })
        .map(|(_, cluster)| cluster)
        .collect();
    if candidates.is_empty() {
        return Err(DetectionError::ClusterSelection {
            segment: "far-right boundary",
            candidates: fine_clusters.len(),
        });
    }

    let far_index = candidates
        .iter()
        .enumerate()
        .max_by_key(|(_, cluster)| FloatOrd(centroid(&right_body, cluster.as_slice()).x))
        .map(|(index, _)| index)
        .expect("candidates is not empty");
    let far_right: Vec<Vector3<f64>> = candidates
        .swap_remove(far_index)
        .iter()
        .map(|&i| right_body[i])
        .collect();

    if candidates.is_empty() {
        return Err(DetectionError::ClusterSelection {
            segment: "near-right boundary",
            candidates: fine_clusters.len(),
        });
    }
    let near_right: Vec<Vector3<f64>> = candidates
        .iter()
        .flat_map(|cluster| cluster.iter().map(|&i| right_body[i]))
        .collect();

    Ok(RoadSegments {
        left,
        near_right,
        far_right,
        right_body,
    })
}
