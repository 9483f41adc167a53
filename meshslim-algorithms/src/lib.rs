//! # meshslim Algorithms
//!
//! Geometric cleanup passes used by the mesh optimization pipeline.
//!
//! This crate provides degenerate-face filtering, vertex welding, Taubin and
//! Laplacian smoothing, watertightness repair (hole filling and winding
//! fixes), and normal finalisation with centroid-preserving recentering.
//! Every pass takes a mesh by reference and returns a new one, so callers can
//! always fall back to the pre-pass mesh.

pub mod adjacency;
pub mod filtering;
pub mod welding;
pub mod smoothing;
pub mod repair;
pub mod normals;

// Re-export commonly used items
pub use adjacency::*;
pub use filtering::*;
pub use welding::*;
pub use smoothing::*;
pub use repair::*;
pub use normals::*;
