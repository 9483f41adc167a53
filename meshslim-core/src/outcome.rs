//! Tagged result of a single pipeline stage

use crate::mesh::TriangleMesh;

/// What a stage produced.
///
/// Stages never swallow failures silently: a stage either succeeded, fell
/// back to a simpler algorithm (`Degraded`), or did nothing (`Skipped`), and
/// the reason travels with the outcome.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The stage ran as requested.
    Success(TriangleMesh),
    /// The stage did not run or its result was discarded; the caller keeps
    /// the pre-stage mesh.
    Skipped(String),
    /// The stage produced a mesh through a fallback path.
    Degraded(TriangleMesh, String),
}

impl StageOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutcome::Skipped(reason.into())
    }

    pub fn degraded(mesh: TriangleMesh, reason: impl Into<String>) -> Self {
        StageOutcome::Degraded(mesh, reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded(..))
    }

    /// The produced mesh, if any
    pub fn mesh(&self) -> Option<&TriangleMesh> {
        match self {
            StageOutcome::Success(mesh) | StageOutcome::Degraded(mesh, _) => Some(mesh),
            StageOutcome::Skipped(_) => None,
        }
    }

    /// The reason attached to a skipped or degraded outcome
    pub fn reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Success(_) => None,
            StageOutcome::Skipped(reason) | StageOutcome::Degraded(_, reason) => Some(reason),
        }
    }
}
