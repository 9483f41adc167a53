//! Clustering-based mesh simplification
//!
//! Implements the Rossignac & Borrel (1993) vertex clustering algorithm on a
//! uniform voxel grid. Every vertex falling in the same voxel is replaced by
//! one representative; triangles are re-derived from the cluster indices and
//! triangles that collapse or repeat are dropped.

use crate::quadric_error::{minimize_quadric, quadric_error_at, vertex_quadrics, Quadric};
use crate::{MeshSimplifier, MIN_FACES};
use log::debug;
use meshslim_core::{to_f32, to_f64, Error, Point3d, Point3f, Result, TriangleMesh, Vector3d};
use std::collections::{BTreeMap, HashSet};

/// Strategy for selecting the representative vertex within a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentativeStrategy {
    /// Arithmetic mean of all vertex positions in the cluster.
    Centroid,
    /// Position that minimizes the summed quadric error for the cluster.
    MinimumError,
}

/// Uniform voxel-grid simplifier.
#[derive(Debug, Clone)]
pub struct ClusteringSimplifier {
    /// Strategy for choosing the representative position of each cluster.
    pub representative_strategy: RepresentativeStrategy,
    /// Fixed voxel edge length. When unset it is derived from the target as
    /// `mean(bbox_extents) / (2 * sqrt(target_faces))`.
    pub voxel_size: Option<f64>,
}

impl Default for ClusteringSimplifier {
    fn default() -> Self {
        Self {
            representative_strategy: RepresentativeStrategy::Centroid,
            voxel_size: None,
        }
    }
}

impl ClusteringSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: RepresentativeStrategy) -> Self {
        self.representative_strategy = strategy;
        self
    }

    pub fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = Some(voxel_size);
        self
    }

    /// Voxel size derived from the mean bounding-box extent and the target.
    pub fn voxel_size_for_target(mesh: &TriangleMesh, target_faces: usize) -> f64 {
        let extents = mesh.extents();
        let mean_extent = (extents.x as f64 + extents.y as f64 + extents.z as f64) / 3.0;
        mean_extent / (2.0 * (target_faces.max(1) as f64).sqrt())
    }

    /// Group vertex indices by voxel. Clusters are ordered by their lowest
    /// member so that untouched vertices keep their relative order.
    fn uniform_clustering(&self, mesh: &TriangleMesh, voxel_size: f64) -> Vec<Vec<usize>> {
        let min = mesh
            .vertices()
            .iter()
            .map(to_f64)
            .fold(Point3d::new(f64::MAX, f64::MAX, f64::MAX), |acc, p| acc.inf(&p));

        let mut cells: BTreeMap<(i64, i64, i64), Vec<usize>> = BTreeMap::new();
        for (vi, v) in mesh.vertices().iter().enumerate() {
            let offset = (to_f64(v) - min) / voxel_size;
            let key = (
                offset.x.floor() as i64,
                offset.y.floor() as i64,
                offset.z.floor() as i64,
            );
            cells.entry(key).or_default().push(vi);
        }

        let mut clusters: Vec<Vec<usize>> = cells.into_values().collect();
        clusters.sort_unstable_by_key(|cluster| cluster[0]);
        clusters
    }

    fn select_representative(&self, cluster: &[usize], positions: &[Point3f], quadrics: &[Quadric]) -> Point3f {
        let centroid = {
            let sum: Vector3d = cluster.iter().map(|&vi| to_f64(&positions[vi]).coords).sum();
            Point3d::from(sum / cluster.len() as f64)
        };

        match self.representative_strategy {
            RepresentativeStrategy::Centroid => to_f32(&centroid),
            RepresentativeStrategy::MinimumError => {
                let q_sum: Quadric = cluster.iter().map(|&vi| quadrics[vi]).sum();
                if let Some(candidate) = minimize_quadric(&q_sum) {
                    return to_f32(&candidate);
                }

                // Fallback: pick the member with minimum quadric error
                cluster
                    .iter()
                    .map(|&vi| (vi, quadric_error_at(&to_f64(&positions[vi]), &q_sum)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(vi, _)| positions[vi])
                    .unwrap_or_else(|| to_f32(&centroid))
            }
        }
    }

    /// Build the simplified mesh from clusters.
    fn build_simplified_mesh(&self, mesh: &TriangleMesh, clusters: &[Vec<usize>]) -> TriangleMesh {
        let mut vertex_to_cluster: Vec<usize> = vec![0; mesh.vertex_count()];
        for (ci, cluster) in clusters.iter().enumerate() {
            for &vi in cluster {
                vertex_to_cluster[vi] = ci;
            }
        }

        let quadrics = match self.representative_strategy {
            RepresentativeStrategy::MinimumError => vertex_quadrics(mesh),
            RepresentativeStrategy::Centroid => Vec::new(),
        };
        let representatives: Vec<Point3f> = clusters
            .iter()
            .map(|cluster| {
                if cluster.len() == 1 {
                    mesh.vertices()[cluster[0]]
                } else {
                    self.select_representative(cluster, mesh.vertices(), &quadrics)
                }
            })
            .collect();

        // Remap faces, filtering degenerate and repeated triangles
        let mut new_faces: Vec<[usize; 3]> = Vec::new();
        let mut seen_faces: HashSet<[usize; 3]> = HashSet::new();
        for face in mesh.faces() {
            let mapped = face.map(|vi| vertex_to_cluster[vi]);
            if mapped[0] == mapped[1] || mapped[1] == mapped[2] || mapped[2] == mapped[0] {
                continue;
            }
            let mut sorted = mapped;
            sorted.sort_unstable();
            if seen_faces.insert(sorted) {
                new_faces.push(mapped);
            }
        }

        let mut simplified = TriangleMesh::from_vertices_and_faces(representatives, new_faces);
        simplified.remove_unreferenced_vertices();
        simplified
    }
}

impl MeshSimplifier for ClusteringSimplifier {
    fn simplify_to(&self, mesh: &TriangleMesh, target_faces: usize) -> Result<TriangleMesh> {
        mesh.validate()?;
        let target_faces = target_faces.max(MIN_FACES);

        let voxel_size = self
            .voxel_size
            .unwrap_or_else(|| Self::voxel_size_for_target(mesh, target_faces));
        if !(voxel_size > 0.0) || !voxel_size.is_finite() {
            return Err(Error::Degenerate(format!(
                "cannot cluster with voxel size {}",
                voxel_size
            )));
        }

        let clusters = self.uniform_clustering(mesh, voxel_size);
        let simplified = self.build_simplified_mesh(mesh, &clusters);
        debug!(
            "Clustering with voxel {:.6}: {} -> {} triangles in {} clusters",
            voxel_size,
            mesh.face_count(),
            simplified.face_count(),
            clusters.len()
        );

        if simplified.face_count() == 0 {
            return Err(Error::Degenerate(format!(
                "voxel size {} collapsed every triangle",
                voxel_size
            )));
        }
        Ok(simplified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_meshes::{make_plane_grid, make_uv_sphere};
    use approx::assert_relative_eq;

    #[test]
    fn test_creation() {
        let s = ClusteringSimplifier::new();
        assert_eq!(s.representative_strategy, RepresentativeStrategy::Centroid);
        assert!(s.voxel_size.is_none());
    }

    #[test]
    fn test_voxel_size_for_target() {
        // 5 x 5 x 0 extents: mean 10/3, target 100 -> /20
        let mesh = make_plane_grid(6);
        let size = ClusteringSimplifier::voxel_size_for_target(&mesh, 100);
        assert_relative_eq!(size, 10.0 / 3.0 / 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_mesh() {
        let s = ClusteringSimplifier::new();
        assert!(s.simplify_to(&TriangleMesh::new(), 10).is_err());
    }

    #[test]
    fn test_fine_voxels_keep_mesh() {
        let s = ClusteringSimplifier::new().with_voxel_size(0.25);
        let mesh = make_plane_grid(6);
        let result = s.simplify_to(&mesh, 10).unwrap();
        assert_eq!(result.vertex_count(), mesh.vertex_count());
        assert_eq!(result.faces(), mesh.faces());
    }

    #[test]
    fn test_planar_grid_clustering() {
        let s = ClusteringSimplifier::new().with_voxel_size(2.0);
        let mesh = make_plane_grid(9);
        let result = s.simplify_to(&mesh, 10).unwrap();

        // 9 x 9 vertices fall into 5 x 5 voxels
        assert_eq!(result.vertex_count(), 25);
        assert!(result.face_count() < mesh.face_count());
        assert!(result.validate().is_ok());
        for n in result.calculate_face_normals() {
            assert!(n.z > 0.99);
        }
    }

    #[test]
    fn test_sphere_clustering_reduces() {
        let s = ClusteringSimplifier::new();
        let mesh = make_uv_sphere(24, 48);
        let result = s.simplify_to(&mesh, 200).unwrap();
        assert!(result.face_count() < mesh.face_count());
        assert!(result.face_count() >= MIN_FACES);

        let mut seen = HashSet::new();
        for f in result.faces() {
            let mut key = *f;
            key.sort_unstable();
            assert!(seen.insert(key), "duplicate triangle {:?}", f);
        }
    }

    #[test]
    fn test_minimum_error_representative() {
        let s = ClusteringSimplifier::new()
            .with_strategy(RepresentativeStrategy::MinimumError)
            .with_voxel_size(2.0);
        let mesh = make_plane_grid(9);
        let result = s.simplify_to(&mesh, 10).unwrap();
        // flat quadrics are singular: members are kept, so z stays 0
        for p in result.vertices() {
            assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let s = ClusteringSimplifier::new();
        let mesh = make_uv_sphere(12, 24);
        let a = s.simplify_to(&mesh, 50).unwrap();
        let b = s.simplify_to(&mesh, 50).unwrap();
        assert_eq!(a, b);
    }
}
