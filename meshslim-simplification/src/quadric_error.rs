//! Quadric error metric helpers
//!
//! A quadric `Q = p pᵀ` for the plane `p = (a, b, c, d)` measures the squared
//! distance of a homogeneous point `v` to that plane as `vᵀ Q v`. Sums of
//! quadrics measure the summed squared distance to many planes.

use meshslim_core::{to_f64, Point3d, Point3f, TriangleMesh};
use nalgebra::{Matrix4, Vector4};

pub type Quadric = Matrix4<f64>;

/// Unit plane through a triangle, `None` when the triangle is degenerate.
pub fn compute_plane(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Option<Vector4<f64>> {
    let (v0, v1, v2) = (to_f64(v0), to_f64(v1), to_f64(v2));
    let n = (v1 - v0).cross(&(v2 - v0));
    let len = n.norm();
    if !(len > f64::EPSILON) || !len.is_finite() {
        return None;
    }
    let n = n / len;
    let d = -n.dot(&v0.coords);
    Some(Vector4::new(n.x, n.y, n.z, d))
}

pub fn plane_to_quadric(p: &Vector4<f64>) -> Quadric {
    p * p.transpose()
}

/// Sum of the plane quadrics of every triangle touching each vertex.
/// Degenerate triangles contribute nothing.
pub fn vertex_quadrics(mesh: &TriangleMesh) -> Vec<Quadric> {
    let vertices = mesh.vertices();
    let mut quadrics = vec![Quadric::zeros(); vertices.len()];
    for face in mesh.faces() {
        let Some(plane) = compute_plane(&vertices[face[0]], &vertices[face[1]], &vertices[face[2]]) else {
            continue;
        };
        let q = plane_to_quadric(&plane);
        for &vi in face {
            quadrics[vi] += q;
        }
    }
    quadrics
}

/// `vᵀ Q v` for the homogeneous point, clamped at zero.
pub fn quadric_error_at(pos: &Point3d, q: &Quadric) -> f64 {
    let v = Vector4::new(pos.x, pos.y, pos.z, 1.0);
    (v.transpose() * q * v)[0].max(0.0)
}

/// Point minimising the quadric, `None` when its 3x3 block is singular.
pub fn minimize_quadric(q: &Quadric) -> Option<Point3d> {
    let q3 = q.fixed_view::<3, 3>(0, 0).into_owned();
    let q1 = q.fixed_view::<3, 1>(0, 3).into_owned();

    // near singular blocks count as singular
    let scale = q3.norm();
    if !(scale > 0.0) || q3.determinant().abs() <= 1e-10 * scale * scale * scale {
        return None;
    }
    let inv = q3.try_inverse()?;
    let p = -inv * q1;
    if p.iter().all(|x| x.is_finite()) {
        Some(Point3d::new(p[0], p[1], p[2]))
    } else {
        None
    }
}
