//! Mesh optimization pipeline
//!
//! Runs the cleanup, welding, decimation, smoothing and repair passes in a
//! fixed order. A stage that fails, falls back or produces an invalid mesh
//! never aborts the run: the pre-stage mesh is carried forward and the stage
//! report records what happened. Only an invalid input, an invalid
//! configuration or a passed deadline fail the whole mesh.

use crate::config::OptimizationParams;
use crate::report::{PipelineResult, Stage, StageReport, StageStatus};
use log::{debug, info, warn};
use meshslim_algorithms::{
    filter_degenerate_faces, finalize, fix_coordinate_system, recenter, recompute_normals,
    remove_non_finite, repair_watertight, smooth, weld_by_distance, weld_by_precision, weld_digits,
};
use meshslim_core::{Deadline, Error, Result, StageOutcome, TriangleMesh};
use meshslim_simplification::{resolve_target, simplify, EdgeCollapseSimplifier, SimplifyOptions};

/// Optimize `mesh` and return the result.
///
/// # Errors
///
/// Fails with [`Error::EmptyMesh`] or [`Error::InvalidData`] for unusable
/// input and [`Error::Config`] for invalid parameters.
pub fn optimize(mesh: TriangleMesh, params: &OptimizationParams) -> Result<TriangleMesh> {
    optimize_with_report(mesh, params).map(|result| result.mesh)
}

/// Optimize `mesh` and keep a report for every stage.
pub fn optimize_with_report(mesh: TriangleMesh, params: &OptimizationParams) -> Result<PipelineResult> {
    optimize_with_deadline(mesh, params, Deadline::none())
}

/// Optimize `mesh`, failing with [`Error::Timeout`] once `deadline` passes.
///
/// The deadline is checked between stages and inside decimation.
pub fn optimize_with_deadline(
    mesh: TriangleMesh,
    params: &OptimizationParams,
    deadline: Deadline,
) -> Result<PipelineResult> {
    params.validate()?;
    deadline.check(Stage::Load.name())?;
    mesh.validate_indices()?;

    let input_faces = mesh.face_count();
    let input_vertices = mesh.vertex_count();
    let (mesh, non_finite) = remove_non_finite(&mesh)?;
    let load_note = (mesh.vertex_count() < input_vertices).then(|| {
        format!(
            "dropped {} triangles using non-finite vertices, compacted {} vertices",
            non_finite,
            input_vertices - mesh.vertex_count()
        )
    });
    let original_centroid = mesh.centroid();

    let mut run = PipelineRun::new(mesh, deadline);
    match load_note {
        Some(note) => run.record(Stage::Load, StageStatus::Degraded, Some(note)),
        None => run.record(Stage::Load, StageStatus::Success, None),
    }

    run.stage(Stage::FilterFaces, |m| {
        Ok(filter_degenerate_faces(m, params.min_face_area))
    })?;

    run.stage(Stage::WeldEarly, |m| {
        if !(params.merge_distance > 0.0) {
            return Ok(StageOutcome::skipped("welding disabled"));
        }
        Ok(match weld_by_distance(m, params.merge_distance) {
            Ok((welded, summary)) => {
                debug!(
                    "Early weld merged {} vertices, dropped {} triangles",
                    summary.merged_vertices, summary.collapsed_faces
                );
                StageOutcome::Success(welded)
            }
            Err(e) => {
                warn!("Early weld failed: {}; keeping vertices unmerged", e);
                StageOutcome::skipped(e.to_string())
            }
        })
    })?;

    run.stage(Stage::Simplify, |m| {
        let Some(target) = resolve_target(
            m.face_count(),
            params.simplify_target_faces,
            params.simplify_keep_ratio,
        ) else {
            return Ok(StageOutcome::skipped("no reduction requested"));
        };
        let options = SimplifyOptions {
            edge_collapse: EdgeCollapseSimplifier::new().with_deadline(deadline),
            ..SimplifyOptions::default()
        };
        Ok(simplify(m, target, &options))
    })?;

    run.stage(Stage::ComputeNormals, with_normals)?;

    // late weld tolerance follows the pre-smoothing extent
    let diagonal = run.mesh.diagonal() as f64;

    run.stage(Stage::Smooth, |m| Ok(smooth(m, &params.smooth_options())))?;
    run.stage(Stage::RecomputeNormals, with_normals)?;

    run.stage(Stage::WeldLate, |m| {
        if !(params.merge_distance > 0.0) {
            return Ok(StageOutcome::skipped("welding disabled"));
        }
        let digits = weld_digits(diagonal, params.merge_distance as f64);
        Ok(match weld_by_precision(m, digits) {
            Ok((welded, summary)) => {
                debug!(
                    "Late weld at {} digits merged {} vertices",
                    digits, summary.merged_vertices
                );
                StageOutcome::Success(welded)
            }
            Err(e) => {
                warn!("Late weld failed: {}; keeping vertices unmerged", e);
                StageOutcome::skipped(e.to_string())
            }
        })
    })?;
    run.stage(Stage::RecomputeNormals, with_normals)?;

    run.stage(Stage::RepairWatertight, |m| {
        if !params.ensure_watertight {
            return Ok(StageOutcome::skipped("watertight repair disabled"));
        }
        Ok(repair_watertight(m, params.max_hole_edges))
    })?;

    run.stage(Stage::Recenter, |m| {
        // the centroid must be measured on the vertices that get exported
        let mut out = m.clone();
        out.remove_unreferenced_vertices();
        recenter(&mut out, &original_centroid);
        Ok(StageOutcome::Success(out))
    })?;

    run.stage(Stage::FixCoordinate, |m| {
        if !params.fix_coordinate {
            return Ok(StageOutcome::skipped("coordinate fix disabled"));
        }
        let mut out = m.clone();
        fix_coordinate_system(&mut out);
        Ok(StageOutcome::Success(out))
    })?;

    run.stage(Stage::Finalize, |m| {
        let mut out = m.clone();
        let removed = finalize(&mut out);
        debug!("Finalize removed {} unreferenced vertices", removed);
        Ok(StageOutcome::Success(out))
    })?;
    deadline.check(Stage::Finalize.name())?;

    let result = run.finish();
    info!(
        "Optimized mesh: {} -> {} triangles, {} -> {} vertices",
        input_faces,
        result.mesh.face_count(),
        input_vertices,
        result.mesh.vertex_count()
    );
    Ok(result)
}

fn with_normals(mesh: &TriangleMesh) -> Result<StageOutcome> {
    let mut out = mesh.clone();
    recompute_normals(&mut out);
    Ok(StageOutcome::Success(out))
}

/// The current mesh and the reports gathered so far
struct PipelineRun {
    mesh: TriangleMesh,
    reports: Vec<StageReport>,
    deadline: Deadline,
}

impl PipelineRun {
    fn new(mesh: TriangleMesh, deadline: Deadline) -> Self {
        Self {
            mesh,
            reports: Vec::new(),
            deadline,
        }
    }

    fn record(&mut self, stage: Stage, status: StageStatus, reason: Option<String>) {
        match status {
            StageStatus::Degraded | StageStatus::Rejected | StageStatus::Failed => warn!(
                "Stage {} {:?}: {}",
                stage,
                status,
                reason.as_deref().unwrap_or("no reason given")
            ),
            StageStatus::Skipped => debug!(
                "Stage {} skipped: {}",
                stage,
                reason.as_deref().unwrap_or("no reason given")
            ),
            StageStatus::Success => debug!(
                "Stage {} done: {} triangles, {} vertices",
                stage,
                self.mesh.face_count(),
                self.mesh.vertex_count()
            ),
        }
        self.reports.push(StageReport::new(stage, status, reason, &self.mesh));
    }

    /// Run one stage against the current mesh and accept its output if valid.
    ///
    /// Only a passed deadline is propagated; every other stage error is
    /// recorded and the current mesh kept.
    fn stage<F>(&mut self, stage: Stage, f: F) -> Result<()>
    where
        F: FnOnce(&TriangleMesh) -> Result<StageOutcome>,
    {
        self.deadline.check(stage.name())?;
        debug!("Stage {} on {} triangles", stage, self.mesh.face_count());

        let (status, reason) = match f(&self.mesh) {
            Ok(outcome) => {
                let (status, reason) = StageReport::status_of(&outcome);
                match outcome {
                    StageOutcome::Skipped(_) => (status, reason),
                    StageOutcome::Success(mesh) | StageOutcome::Degraded(mesh, _) => {
                        match mesh.validate() {
                            Ok(()) => {
                                self.mesh = mesh;
                                (status, reason)
                            }
                            Err(e) => (StageStatus::Rejected, Some(e.to_string())),
                        }
                    }
                }
            }
            Err(e @ Error::Timeout(_)) => return Err(e),
            Err(e) => (StageStatus::Failed, Some(e.to_string())),
        };

        self.record(stage, status, reason);
        Ok(())
    }

    fn finish(self) -> PipelineResult {
        PipelineResult {
            mesh: self.mesh,
            reports: self.reports,
        }
    }
}
