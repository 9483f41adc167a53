//! Normal finalisation, recentering and axis conversion

use log::debug;
use meshslim_core::{Point3f, Transform3D, Transformable, TriangleMesh, Vector3f};

/// Recompute face and area-weighted vertex normals in place.
pub fn recompute_normals(mesh: &mut TriangleMesh) {
    mesh.compute_normals();
}

/// Translate the mesh so its vertex centroid lands on `target`.
///
/// Returns the applied translation.
pub fn recenter(mesh: &mut TriangleMesh, target: &Point3f) -> Vector3f {
    let delta = target - mesh.centroid();
    if delta != Vector3f::zeros() {
        mesh.translate(&delta);
    }
    debug!("Recentered by {:?}", delta);
    delta
}

/// Rotate a Z-up mesh into a Y-up frame (-90 degrees about X).
pub fn fix_coordinate_system(mesh: &mut TriangleMesh) {
    mesh.transform(&Transform3D::z_up_to_y_up());
}

/// Drop unreferenced vertices and compute final normals.
///
/// Returns the number of vertices removed.
pub fn finalize(mesh: &mut TriangleMesh) -> usize {
    let removed = mesh.remove_unreferenced_vertices();
    mesh.compute_normals();
    removed
}
