//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use crate::traits::{Drawable, Transformable};
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Positions and faces are the only primary data. Face and vertex normals are
/// derived caches: they are `None` until [`TriangleMesh::compute_normals`]
/// runs and every mutation of the positions or faces drops them again, so a
/// stale normal can never be read. Bounds, centroid and areas are computed on
/// demand and never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Point3f>,
    faces: Vec<[usize; 3]>,
    #[serde(default)]
    face_normals: Option<Vec<Vector3f>>,
    #[serde(default)]
    normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            face_normals: None,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    pub fn vertices(&self) -> &[Point3f] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Mutable access to the positions. Drops the derived normals.
    pub fn vertices_mut(&mut self) -> &mut Vec<Point3f> {
        self.invalidate();
        &mut self.vertices
    }

    /// Replace the face list. Drops the derived normals.
    pub fn set_faces(&mut self, faces: Vec<[usize; 3]>) {
        self.invalidate();
        self.faces = faces;
    }

    /// Keep only the faces for which `keep` returns true. Drops the derived normals.
    pub fn retain_faces<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&[usize; 3]) -> bool,
    {
        let before = self.faces.len();
        self.faces.retain(keep);
        let removed = before - self.faces.len();
        if removed > 0 {
            self.invalidate();
        }
        removed
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        self.invalidate();
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.invalidate();
        self.faces.push(face);
    }

    /// Consume the mesh and return its positions and faces
    pub fn into_parts(self) -> (Vec<Point3f>, Vec<[usize; 3]>) {
        (self.vertices, self.faces)
    }

    fn invalidate(&mut self) {
        self.face_normals = None;
        self.normals = None;
    }

    /// Check the index invariant and that the mesh has geometry to work on.
    /// Coordinates must also be finite.
    pub fn validate(&self) -> Result<()> {
        self.validate_indices()?;
        if let Some(vi) = self.vertices.iter().position(|p| !is_finite_point(p)) {
            return Err(Error::InvalidData(format!(
                "vertex {} has a non-finite coordinate",
                vi
            )));
        }
        Ok(())
    }

    /// Like [`TriangleMesh::validate`] without the coordinate check.
    pub fn validate_indices(&self) -> Result<()> {
        if self.faces.is_empty() {
            return Err(Error::EmptyMesh("mesh has no triangles".to_string()));
        }
        if self.vertices.is_empty() {
            return Err(Error::EmptyMesh("mesh has no vertices".to_string()));
        }
        let n = self.vertices.len();
        if let Some((fi, face)) = self
            .faces
            .iter()
            .enumerate()
            .find(|(_, f)| f.iter().any(|&i| i >= n))
        {
            return Err(Error::InvalidData(format!(
                "face {} {:?} references a vertex outside 0..{}",
                fi, face, n
            )));
        }
        Ok(())
    }

    /// Area of a single triangle: half the magnitude of the cross product of
    /// the two edges leaving its first vertex.
    pub fn face_area(&self, face_index: usize) -> f32 {
        let [a, b, c] = self.faces[face_index];
        triangle_area(&self.vertices[a], &self.vertices[b], &self.vertices[c])
    }

    /// Areas of all triangles in face order
    pub fn face_areas(&self) -> Vec<f32> {
        (0..self.faces.len()).map(|fi| self.face_area(fi)).collect()
    }

    /// Total surface area
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|fi| self.face_area(fi) as f64).sum()
    }

    /// Per-axis size of the bounding box
    pub fn extents(&self) -> Vector3f {
        let (min, max) = self.bounding_box();
        max - min
    }

    /// Length of the bounding box diagonal
    pub fn diagonal(&self) -> f32 {
        self.extents().norm()
    }

    /// Arithmetic mean of the vertex positions, accumulated in double precision.
    pub fn centroid(&self) -> Point3f {
        if self.vertices.is_empty() {
            return Point3f::origin();
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3d::zeros(), |acc, p| acc + to_f64(p).coords);
        to_f32(&Point3d::from(sum / self.vertices.len() as f64))
    }

    /// Calculate face normals. Degenerate triangles get a zero normal.
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                let n = face_cross(&self.vertices, face);
                let len = n.norm();
                if len > f32::MIN_POSITIVE && len.is_finite() {
                    n / len
                } else {
                    Vector3f::zeros()
                }
            })
            .collect()
    }

    /// Calculate area-weighted vertex normals.
    ///
    /// Each vertex accumulates the unnormalised cross product of every incident
    /// face, whose length is twice the face area, and the sum is normalised.
    /// Unreferenced vertices get a zero normal.
    pub fn calculate_vertex_normals(&self) -> Vec<Vector3f> {
        let mut sums = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            let n = face_cross(&self.vertices, face);
            if !(n.x.is_finite() && n.y.is_finite() && n.z.is_finite()) {
                continue;
            }
            for &vi in face {
                sums[vi] += n;
            }
        }
        sums.into_iter()
            .map(|n| {
                let len = n.norm();
                if len > f32::MIN_POSITIVE {
                    n / len
                } else {
                    Vector3f::zeros()
                }
            })
            .collect()
    }

    /// Recompute both normal caches from the current geometry.
    pub fn compute_normals(&mut self) {
        self.face_normals = Some(self.calculate_face_normals());
        self.normals = Some(self.calculate_vertex_normals());
    }

    /// Per-face normals, if they have been computed since the last mutation
    pub fn face_normals(&self) -> Option<&[Vector3f]> {
        self.face_normals.as_deref()
    }

    /// Per-vertex normals, if they have been computed since the last mutation
    pub fn normals(&self) -> Option<&[Vector3f]> {
        self.normals.as_deref()
    }

    pub fn has_normals(&self) -> bool {
        self.face_normals.is_some() && self.normals.is_some()
    }

    /// Translate every vertex by `delta`.
    pub fn translate(&mut self, delta: &Vector3f) {
        self.invalidate();
        for v in &mut self.vertices {
            *v += delta;
        }
    }

    /// Per-vertex flag telling whether any face uses the vertex
    pub fn referenced_vertices(&self) -> Vec<bool> {
        let mut used = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &vi in face {
                used[vi] = true;
            }
        }
        used
    }

    /// Drop vertices no face refers to and compact the indices, keeping the
    /// relative order of the survivors. Returns the number removed.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let used = self.referenced_vertices();
        let removed = used.iter().filter(|&&u| !u).count();
        if removed == 0 {
            return 0;
        }

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len() - removed);
        for (vi, p) in self.vertices.iter().enumerate() {
            if used[vi] {
                remap[vi] = kept.len();
                kept.push(*p);
            }
        }
        for face in &mut self.faces {
            for vi in face.iter_mut() {
                *vi = remap[*vi];
            }
        }
        self.vertices = kept;
        self.invalidate();
        removed
    }
}

/// Area of the triangle `(a, b, c)`
pub fn triangle_area(a: &Point3f, b: &Point3f, c: &Point3f) -> f32 {
    0.5 * (b - a).cross(&(c - a)).norm()
}

#[inline]
fn face_cross(vertices: &[Point3f], face: &[usize; 3]) -> Vector3f {
    let v0 = vertices[face[0]];
    let v1 = vertices[face[1]];
    let v2 = vertices[face[2]];
    (v1 - v0).cross(&(v2 - v0))
}

impl Drawable for TriangleMesh {
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.vertices.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let mut min = self.vertices[0];
        let mut max = self.vertices[0];

        for vertex in &self.vertices {
            min.x = min.x.min(vertex.x);
            min.y = min.y.min(vertex.y);
            min.z = min.z.min(vertex.z);

            max.x = max.x.max(vertex.x);
            max.y = max.y.max(vertex.y);
            max.z = max.z.max(vertex.z);
        }

        (min, max)
    }

    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }
}

impl Transformable for TriangleMesh {
    fn transform(&mut self, transform: &Transform3D) {
        self.invalidate();
        for v in &mut self.vertices {
            *v = transform.transform_point(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_unit_square() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_counts() {
        let mesh = make_unit_square();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(!mesh.is_empty());
        assert!(TriangleMesh::new().is_empty());
    }

    #[test]
    fn test_face_area() {
        let mesh = make_unit_square();
        assert_relative_eq!(mesh.face_area(0), 0.5);
        assert_relative_eq!(mesh.surface_area(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bounds_and_centroid() {
        let mesh = make_unit_square();
        let (min, max) = mesh.bounding_box();
        assert_eq!(min, Point3f::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3f::new(1.0, 1.0, 0.0));
        assert_relative_eq!(mesh.diagonal(), 2.0f32.sqrt(), epsilon = 1e-6);
        assert_relative_eq!(mesh.centroid(), Point3f::new(0.5, 0.5, 0.0), epsilon = 1e-6);
        assert_relative_eq!(mesh.center(), Point3f::new(0.5, 0.5, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_normals_are_invalidated() {
        let mut mesh = make_unit_square();
        assert!(mesh.normals().is_none());

        mesh.compute_normals();
        assert!(mesh.has_normals());
        for n in mesh.normals().unwrap() {
            assert_relative_eq!(*n, Vector3f::new(0.0, 0.0, 1.0), epsilon = 1e-6);
        }

        mesh.translate(&Vector3f::new(1.0, 0.0, 0.0));
        assert!(mesh.normals().is_none());
        assert!(mesh.face_normals().is_none());

        mesh.compute_normals();
        mesh.vertices_mut()[0].z = 1.0;
        assert!(!mesh.has_normals());
    }

    #[test]
    fn test_degenerate_face_normal_is_zero() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let normals = mesh.calculate_face_normals();
        assert_eq!(normals[0], Vector3f::zeros());
    }

    #[test]
    fn test_vertex_normals_are_area_weighted() {
        // A large face in +Z and a small face in +X share vertex 0.
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(10.0, 0.0, 0.0),
                Point3f::new(0.0, 10.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 3, 4]],
        );
        let normals = mesh.calculate_vertex_normals();
        assert!(normals[0].z > 0.99);
        assert!(normals[0].x > 0.0);
        assert_relative_eq!(normals[0].norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            TriangleMesh::new().validate(),
            Err(Error::EmptyMesh(_))
        ));

        let mut mesh = make_unit_square();
        assert!(mesh.validate().is_ok());

        mesh.add_face([0, 1, 7]);
        assert!(matches!(mesh.validate(), Err(Error::InvalidData(_))));

        let mut mesh = make_unit_square();
        mesh.vertices_mut()[2].x = f32::NAN;
        assert!(matches!(mesh.validate(), Err(Error::InvalidData(_))));
        assert!(mesh.validate_indices().is_ok());
    }

    #[test]
    fn test_remove_unreferenced_vertices() {
        let mut mesh = make_unit_square();
        mesh.add_vertex(Point3f::new(5.0, 5.0, 5.0));
        mesh.set_faces(vec![[1, 2, 3]]);

        let removed = mesh.remove_unreferenced_vertices();
        assert_eq!(removed, 2);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces(), &[[0, 1, 2]]);
        assert_eq!(mesh.vertices()[0], Point3f::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_retain_faces() {
        let mut mesh = make_unit_square();
        mesh.compute_normals();
        let removed = mesh.retain_faces(|f| f[2] != 3);
        assert_eq!(removed, 1);
        assert_eq!(mesh.face_count(), 1);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn test_transform() {
        let mut mesh = make_unit_square();
        mesh.transform(&Transform3D::translation(Vector3f::new(0.0, 0.0, 2.0)));
        assert!(mesh.vertices().iter().all(|v| (v.z - 2.0).abs() < 1e-6));
    }
}
