//! # meshslim
//!
//! Turns arbitrary triangle meshes into compact, renderer-ready meshes.
//!
//! The pipeline filters degenerate triangles, welds near-duplicate vertices,
//! decimates to a triangle budget, smooths, repairs holes and orientation,
//! and finally restores the original centroid and computes normals. Stages
//! that fail fall back or are skipped instead of aborting the mesh.
//!
//! ## Quick Start
//!
//! ```rust
//! use meshslim_pipeline::{optimize, OptimizationParams, Point3f, TriangleMesh};
//!
//! let mesh = TriangleMesh::from_vertices_and_faces(
//!     vec![
//!         Point3f::new(0.0, 0.0, 0.0),
//!         Point3f::new(1.0, 0.0, 0.0),
//!         Point3f::new(0.5, 1.0, 0.0),
//!         Point3f::new(0.5, 0.5, 1.0),
//!     ],
//!     vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
//! );
//! let params = OptimizationParams::default()
//!     .with_taubin(0, 0.5, -0.53)
//!     .with_fix_coordinate(false);
//! let optimized = optimize(mesh, &params).unwrap();
//! assert_eq!(optimized.face_count(), 4);
//! assert!(optimized.has_normals());
//! ```

pub mod config;
pub mod report;
pub mod pipeline;
pub mod batch;

pub use config::OptimizationParams;
pub use report::{PipelineResult, Stage, StageReport, StageStatus};
pub use pipeline::{optimize, optimize_with_deadline, optimize_with_report};
pub use batch::{BatchItem, BatchOptions, BatchRunner, BatchSummary};

pub use meshslim_core::{Deadline, Error, Point3f, Result, StageOutcome, TriangleMesh, Vector3f};

pub use meshslim_algorithms as algorithms;
pub use meshslim_simplification as simplification;
