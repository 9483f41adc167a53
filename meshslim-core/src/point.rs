//! Point and vector types

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Widen a single precision point for accumulation.
#[inline]
pub fn to_f64(p: &Point3f) -> Point3d {
    Point3d::new(p.x as f64, p.y as f64, p.z as f64)
}

/// Narrow a double precision point back to mesh precision.
#[inline]
pub fn to_f32(p: &Point3d) -> Point3f {
    Point3f::new(p.x as f32, p.y as f32, p.z as f32)
}

/// Whether every coordinate of the point is finite.
#[inline]
pub fn is_finite_point(p: &Point3f) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}
