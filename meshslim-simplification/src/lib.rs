//! Mesh simplification and decimation algorithms
//!
//! This crate provides algorithms for reducing mesh complexity while
//! preserving important geometric features:
//! - Quadric error decimation on a half-edge structure
//! - Clustering-based simplification as a fallback
//! - The `simplify` stage combining the two

pub mod quadric_error;
pub mod edge_collapse;
pub mod clustering;

#[cfg(test)]
mod test_meshes;

pub use quadric_error::*;
pub use edge_collapse::*;
pub use clustering::*;

use log::{debug, warn};
use meshslim_core::{Result, StageOutcome, TriangleMesh};

/// No simplifier reduces a mesh below this many triangles.
pub const MIN_FACES: usize = 4;

/// Simplify a mesh to a triangle budget
pub trait MeshSimplifier {
    /// Reduce `mesh` to at most `target_faces` triangles where possible.
    /// The target is floored at [`MIN_FACES`].
    fn simplify_to(&self, mesh: &TriangleMesh, target_faces: usize) -> Result<TriangleMesh>;
}

/// Resolve the triangle budget for a mesh with `current_faces` triangles.
///
/// An explicit positive `target_faces` overrides `keep_ratio`. Returns `None`
/// when no reduction is requested or the mesh is already within budget.
pub fn resolve_target(
    current_faces: usize,
    target_faces: Option<usize>,
    keep_ratio: Option<f32>,
) -> Option<usize> {
    if let Some(target) = target_faces.filter(|&t| t > 0) {
        return (current_faces > target).then(|| target.max(MIN_FACES));
    }

    let ratio = keep_ratio.filter(|r| *r > 0.0 && *r < 1.0)?;
    let target = ((current_faces as f64 * ratio as f64).floor() as usize).max(MIN_FACES);
    (target < current_faces).then_some(target)
}

/// Simplifiers used by [`simplify`]
#[derive(Debug, Clone, Default)]
pub struct SimplifyOptions {
    pub edge_collapse: EdgeCollapseSimplifier,
    pub clustering: ClusteringSimplifier,
}

fn usable(mesh: &TriangleMesh) -> bool {
    mesh.validate().is_ok() && mesh.face_count() >= MIN_FACES
}

/// Simplification stage: quadric decimation, falling back to vertex
/// clustering when decimation fails or stalls above the target.
pub fn simplify(mesh: &TriangleMesh, target_faces: usize, options: &SimplifyOptions) -> StageOutcome {
    let target_faces = target_faces.max(MIN_FACES);
    if mesh.face_count() <= target_faces {
        return StageOutcome::skipped(format!(
            "{} triangles already within target {}",
            mesh.face_count(),
            target_faces
        ));
    }

    let decimated = match options.edge_collapse.simplify_to(mesh, target_faces) {
        Ok(result) if result.face_count() <= target_faces && usable(&result) => {
            debug!("Decimated {} -> {} triangles", mesh.face_count(), result.face_count());
            return StageOutcome::Success(result);
        }
        Ok(result) if usable(&result) => {
            debug!(
                "Decimation stalled at {} triangles (target {})",
                result.face_count(),
                target_faces
            );
            Some(result)
        }
        Ok(_) => {
            warn!("Decimation produced an unusable mesh");
            None
        }
        Err(e) => {
            warn!("Decimation failed: {}", e);
            None
        }
    };

    let clustered = match options.clustering.simplify_to(mesh, target_faces) {
        Ok(result) if usable(&result) => Some(result),
        Ok(result) => {
            warn!("Clustering produced an unusable mesh with {} triangles", result.face_count());
            None
        }
        Err(e) => {
            warn!("Clustering failed: {}", e);
            None
        }
    };

    match (decimated, clustered) {
        (Some(stalled), Some(clustered)) if clustered.face_count() < stalled.face_count() => {
            let reason = format!(
                "decimation stalled at {} triangles, clustering reached {}",
                stalled.face_count(),
                clustered.face_count()
            );
            StageOutcome::degraded(clustered, reason)
        }
        (Some(stalled), _) => {
            let reason = format!(
                "decimation stalled at {} triangles (target {})",
                stalled.face_count(),
                target_faces
            );
            StageOutcome::degraded(stalled, reason)
        }
        (None, Some(clustered)) => {
            let reason = format!(
                "decimation failed, clustering reached {} triangles",
                clustered.face_count()
            );
            StageOutcome::degraded(clustered, reason)
        }
        (None, None) => StageOutcome::skipped("neither decimation nor clustering produced a valid mesh"),
    }
}
