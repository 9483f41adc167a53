//! Shared fixtures for unit tests

use meshslim_core::{Point3f, TriangleMesh};

/// Flat `size` x `size` vertex grid in the z = 0 plane, normals along +z.
pub fn make_plane_grid(size: usize) -> TriangleMesh {
    let mut vertices = Vec::new();
    for y in 0..size {
        for x in 0..size {
            vertices.push(Point3f::new(x as f32, y as f32, 0.0));
        }
    }
    let mut faces = Vec::new();
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, tr, bl]);
            faces.push([tr, br, bl]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

/// Closed, outward wound unit sphere with poles on the z axis.
pub fn make_uv_sphere(stacks: usize, slices: usize) -> TriangleMesh {
    let mut vertices = vec![Point3f::new(0.0, 0.0, 1.0)];
    for i in 1..stacks {
        let theta = std::f32::consts::PI * i as f32 / stacks as f32;
        for j in 0..slices {
            let phi = 2.0 * std::f32::consts::PI * j as f32 / slices as f32;
            vertices.push(Point3f::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    vertices.push(Point3f::new(0.0, 0.0, -1.0));
    let bottom = vertices.len() - 1;
    let ring = |i: usize, j: usize| 1 + (i - 1) * slices + j % slices;

    let mut faces = Vec::new();
    for j in 0..slices {
        faces.push([0, ring(1, j), ring(1, j + 1)]);
        faces.push([bottom, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
    }
    for i in 1..stacks - 1 {
        for j in 0..slices {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
            faces.push([a, c, d]);
            faces.push([a, d, b]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}
