//! Core data structures and traits for meshslim
//!
//! This crate provides the indexed triangle mesh that flows through the
//! optimization pipeline, its geometry primitives (areas, bounds, centroid,
//! normals), transformations, the per-stage outcome type, the cooperative
//! deadline and the shared error type.

pub mod point;
pub mod mesh;
pub mod traits;
pub mod transform;
pub mod outcome;
pub mod deadline;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use traits::*;
pub use transform::*;
pub use outcome::*;
pub use deadline::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix4};

// Type aliases for easier imports
pub type Mesh = TriangleMesh;
