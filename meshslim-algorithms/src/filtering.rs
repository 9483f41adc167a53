//! Degenerate face filtering

use log::{debug, warn};
use meshslim_core::{is_finite_point, Error, Result, StageOutcome, TriangleMesh};

/// Remove triangles whose area does not exceed a threshold
///
/// A triangle's area is half the magnitude of the cross product of the two
/// edges leaving its first vertex. Triangles with an area strictly greater
/// than `min_face_area` are kept. Triangles that repeat a vertex index have
/// zero area and are removed by the same rule. Vertices are left in place;
/// unreferenced ones are compacted by a later pass.
///
/// # Arguments
/// * `mesh` - Input mesh
/// * `min_face_area` - Area threshold in squared mesh units
///
/// # Returns
/// * `Result<(TriangleMesh, usize)>` - Filtered mesh and number of triangles removed
///
/// # Errors
/// Returns [`Error::Degenerate`] when every triangle falls below the threshold.
///
/// # Example
/// ```rust
/// use meshslim_core::{Point3f, TriangleMesh};
/// use meshslim_algorithms::remove_small_faces;
///
/// fn main() -> meshslim_core::Result<()> {
///     let mesh = TriangleMesh::from_vertices_and_faces(
///         vec![
///             Point3f::new(0.0, 0.0, 0.0),
///             Point3f::new(1.0, 0.0, 0.0),
///             Point3f::new(0.0, 1.0, 0.0),
///             Point3f::new(2.0, 0.0, 0.0),
///         ],
///         vec![[0, 1, 2], [0, 1, 3]],
///     );
///
///     let (filtered, removed) = remove_small_faces(&mesh, 1e-6)?;
///     assert_eq!(removed, 1);
///     assert_eq!(filtered.face_count(), 1);
///     Ok(())
/// }
/// ```
pub fn remove_small_faces(mesh: &TriangleMesh, min_face_area: f32) -> Result<(TriangleMesh, usize)> {
    let kept: Vec<[usize; 3]> = mesh
        .faces()
        .iter()
        .enumerate()
        .filter(|&(fi, _)| mesh.face_area(fi) > min_face_area)
        .map(|(_, face)| *face)
        .collect();

    if kept.is_empty() {
        return Err(Error::Degenerate(format!(
            "all {} triangles have an area <= {:e}",
            mesh.face_count(),
            min_face_area
        )));
    }

    let removed = mesh.face_count() - kept.len();
    if removed == 0 {
        return Ok((mesh.clone(), 0));
    }

    let mut filtered = mesh.clone();
    filtered.set_faces(kept);
    Ok((filtered, removed))
}

/// Drop triangles that use a vertex with a NaN or infinite coordinate
///
/// The offending vertices and any other vertex left unreferenced are
/// compacted away.
///
/// # Returns
/// * `Result<(TriangleMesh, usize)>` - Cleaned mesh and number of triangles removed
///
/// # Errors
/// Returns [`Error::InvalidData`] when every triangle touches a non-finite vertex.
pub fn remove_non_finite(mesh: &TriangleMesh) -> Result<(TriangleMesh, usize)> {
    let bad: Vec<bool> = mesh.vertices().iter().map(|p| !is_finite_point(p)).collect();
    if !bad.iter().any(|&b| b) {
        return Ok((mesh.clone(), 0));
    }

    let mut cleaned = mesh.clone();
    let removed = cleaned.retain_faces(|face| face.iter().all(|&vi| !bad[vi]));
    if cleaned.face_count() == 0 {
        return Err(Error::InvalidData(format!(
            "all {} triangles use a vertex with a non-finite coordinate",
            mesh.face_count()
        )));
    }
    cleaned.remove_unreferenced_vertices();
    Ok((cleaned, removed))
}

/// Degenerate-face filter stage
///
/// Skipped when `min_face_area` is not positive. When filtering would remove
/// every triangle the original triangles are kept and the outcome is
/// degraded, so this stage never produces an empty mesh.
pub fn filter_degenerate_faces(mesh: &TriangleMesh, min_face_area: f32) -> StageOutcome {
    if !(min_face_area > 0.0) {
        return StageOutcome::skipped("face area filtering disabled");
    }

    match remove_small_faces(mesh, min_face_area) {
        Ok((filtered, removed)) => {
            debug!(
                "Removed {} of {} triangles with area <= {:e}",
                removed,
                mesh.face_count(),
                min_face_area
            );
            StageOutcome::Success(filtered)
        }
        Err(e) => {
            warn!("{}; keeping the original triangles", e);
            StageOutcome::degraded(mesh.clone(), e.to_string())
        }
    }
}
