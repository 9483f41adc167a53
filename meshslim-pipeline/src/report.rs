//! Per-stage reports collected by the pipeline

use meshslim_core::{StageOutcome, TriangleMesh};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Load,
    FilterFaces,
    WeldEarly,
    Simplify,
    ComputeNormals,
    Smooth,
    RecomputeNormals,
    WeldLate,
    RepairWatertight,
    Recenter,
    FixCoordinate,
    Finalize,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::FilterFaces => "filter_faces",
            Stage::WeldEarly => "weld_early",
            Stage::Simplify => "simplify",
            Stage::ComputeNormals => "compute_normals",
            Stage::Smooth => "smooth",
            Stage::RecomputeNormals => "recompute_normals",
            Stage::WeldLate => "weld_late",
            Stage::RepairWatertight => "repair_watertight",
            Stage::Recenter => "recenter",
            Stage::FixCoordinate => "fix_coordinate",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Success,
    Skipped,
    /// Produced a mesh through a fallback
    Degraded,
    /// Produced an invalid mesh which was discarded
    Rejected,
    /// Returned an error; the pre-stage mesh was kept
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub reason: Option<String>,
    /// Triangle count after the stage
    pub faces: usize,
    /// Vertex count after the stage
    pub vertices: usize,
}

impl StageReport {
    pub fn new(stage: Stage, status: StageStatus, reason: Option<String>, mesh: &TriangleMesh) -> Self {
        Self {
            stage,
            status,
            reason,
            faces: mesh.face_count(),
            vertices: mesh.vertex_count(),
        }
    }

    /// Status and reason of a stage outcome, before its mesh is accepted
    pub fn status_of(outcome: &StageOutcome) -> (StageStatus, Option<String>) {
        match outcome {
            StageOutcome::Success(_) => (StageStatus::Success, None),
            StageOutcome::Skipped(reason) => (StageStatus::Skipped, Some(reason.clone())),
            StageOutcome::Degraded(_, reason) => (StageStatus::Degraded, Some(reason.clone())),
        }
    }
}

/// The optimized mesh plus a report for every stage that ran.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub mesh: TriangleMesh,
    pub reports: Vec<StageReport>,
}

impl PipelineResult {
    /// Report of the last run of `stage`
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.reports.iter().rev().find(|r| r.stage == stage)
    }

    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.report(stage).map(|r| r.status)
    }

    /// True when any stage fell back, was rejected or failed
    pub fn has_warnings(&self) -> bool {
        self.reports.iter().any(|r| {
            matches!(
                r.status,
                StageStatus::Degraded | StageStatus::Rejected | StageStatus::Failed
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshslim_core::Point3f;

    fn triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn test_status_of_outcomes() {
        assert_eq!(
            StageReport::status_of(&StageOutcome::Success(triangle())),
            (StageStatus::Success, None)
        );
        assert_eq!(
            StageReport::status_of(&StageOutcome::skipped("off")),
            (StageStatus::Skipped, Some("off".to_string()))
        );
        assert_eq!(
            StageReport::status_of(&StageOutcome::degraded(triangle(), "fallback")).0,
            StageStatus::Degraded
        );
    }

    #[test]
    fn test_result_lookup() {
        let mesh = triangle();
        let result = PipelineResult {
            reports: vec![
                StageReport::new(Stage::Load, StageStatus::Success, None, &mesh),
                StageReport::new(Stage::RecomputeNormals, StageStatus::Success, None, &mesh),
                StageReport::new(Stage::RecomputeNormals, StageStatus::Failed, Some("x".into()), &mesh),
            ],
            mesh,
        };
        assert_eq!(result.status(Stage::RecomputeNormals), Some(StageStatus::Failed));
        assert_eq!(result.status(Stage::Smooth), None);
        assert_eq!(result.report(Stage::Load).map(|r| r.faces), Some(1));
        assert!(result.has_warnings());
        assert_eq!(Stage::WeldLate.to_string(), "weld_late");
    }
}
