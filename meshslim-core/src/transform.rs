//! 3D transformation utilities

use nalgebra::{Matrix4, Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// An affine transformation applied to mesh positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Rotation of `angle` radians about `axis`
    pub fn axis_angle(axis: Vector3<f32>, angle: f32) -> Self {
        let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle);
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// The Z-up to Y-up convention change: a rotation of -90 degrees about X.
    ///
    /// Maps `+Z` to `+Y` and `+Y` to `-Z`.
    pub fn z_up_to_y_up() -> Self {
        Self::axis_angle(Vector3::x(), -std::f32::consts::FRAC_PI_2)
    }

    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Rotation and scale part applied to a direction
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.matrix.fixed_view::<3, 3>(0, 0) * vector
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            matrix: self.matrix * rhs.matrix,
        }
    }
}
