//! Edge and vertex adjacency

use meshslim_core::TriangleMesh;
use std::collections::BTreeMap;

/// Undirected edge key, smaller index first
pub type EdgeKey = (usize, usize);

/// Build an undirected edge key
#[inline]
pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// True when `face` walks the directed edge `a -> b`
#[inline]
pub fn has_directed_edge(face: &[usize; 3], a: usize, b: usize) -> bool {
    (0..3).any(|i| face[i] == a && face[(i + 1) % 3] == b)
}

/// Undirected edge to incident face map.
///
/// Edges are kept in a sorted map so every traversal built on top of it is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    edge_faces: BTreeMap<EdgeKey, Vec<usize>>,
}

impl MeshAdjacency {
    pub fn from_mesh(mesh: &TriangleMesh) -> Self {
        let mut edge_faces: BTreeMap<EdgeKey, Vec<usize>> = BTreeMap::new();
        for (fi, face) in mesh.faces().iter().enumerate() {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                if a == b {
                    continue;
                }
                edge_faces.entry(edge_key(a, b)).or_default().push(fi);
            }
        }
        Self { edge_faces }
    }

    pub fn edge_count(&self) -> usize {
        self.edge_faces.len()
    }

    /// Faces incident to an undirected edge
    pub fn faces_of(&self, a: usize, b: usize) -> &[usize] {
        self.edge_faces
            .get(&edge_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = (&EdgeKey, &Vec<usize>)> {
        self.edge_faces.iter()
    }

    /// Edges with exactly one incident face
    pub fn boundary_edges(&self) -> Vec<EdgeKey> {
        self.edge_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(edge, _)| *edge)
            .collect()
    }

    /// Edges with more than two incident faces
    pub fn non_manifold_edges(&self) -> Vec<EdgeKey> {
        self.edge_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(edge, _)| *edge)
            .collect()
    }

    /// Every edge borders exactly two faces
    pub fn is_watertight(&self) -> bool {
        !self.edge_faces.is_empty() && self.edge_faces.values().all(|faces| faces.len() == 2)
    }

    /// Every edge shared by two faces is walked in opposite directions
    pub fn is_winding_consistent(&self, mesh: &TriangleMesh) -> bool {
        let faces = mesh.faces();
        self.edge_faces.iter().all(|(&(a, b), incident)| {
            if incident.len() != 2 {
                return true;
            }
            let first = has_directed_edge(&faces[incident[0]], a, b);
            let second = has_directed_edge(&faces[incident[1]], a, b);
            first != second
        })
    }
}

/// Sorted, deduplicated edge neighbours of every vertex
pub fn vertex_neighbors(mesh: &TriangleMesh) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); mesh.vertex_count()];
    for face in mesh.faces() {
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            if a != b {
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}

/// Every edge of the mesh borders exactly two triangles
pub fn is_watertight(mesh: &TriangleMesh) -> bool {
    MeshAdjacency::from_mesh(mesh).is_watertight()
}

/// Every edge shared by two triangles is traversed in opposite directions
pub fn is_winding_consistent(mesh: &TriangleMesh) -> bool {
    MeshAdjacency::from_mesh(mesh).is_winding_consistent(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshslim_core::Point3f;

    fn make_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        )
    }

    #[test]
    fn test_tetrahedron_is_watertight() {
        let mesh = make_tetrahedron();
        let adjacency = MeshAdjacency::from_mesh(&mesh);
        assert_eq!(adjacency.edge_count(), 6);
        assert!(adjacency.is_watertight());
        assert!(adjacency.is_winding_consistent(&mesh));
        assert!(adjacency.boundary_edges().is_empty());
    }

    #[test]
    fn test_open_mesh_boundary() {
        let mut mesh = make_tetrahedron();
        mesh.retain_faces(|f| *f != [0, 3, 2]);
        let adjacency = MeshAdjacency::from_mesh(&mesh);
        assert!(!adjacency.is_watertight());
        assert_eq!(adjacency.boundary_edges(), vec![(0, 2), (0, 3), (2, 3)]);
        assert_eq!(adjacency.faces_of(3, 0), &[1]);
    }

    #[test]
    fn test_flipped_face_breaks_winding() {
        let mut mesh = make_tetrahedron();
        let mut faces = mesh.faces().to_vec();
        faces[2] = [1, 3, 2];
        mesh.set_faces(faces);
        assert!(is_watertight(&mesh));
        assert!(!is_winding_consistent(&mesh));
    }

    #[test]
    fn test_non_manifold_edge() {
        let mut mesh = make_tetrahedron();
        let apex = mesh.add_vertex(Point3f::new(1.0, 1.0, 1.0));
        mesh.add_face([0, 1, apex]);
        let adjacency = MeshAdjacency::from_mesh(&mesh);
        assert_eq!(adjacency.non_manifold_edges(), vec![(0, 1)]);
        assert!(!adjacency.is_watertight());
    }

    #[test]
    fn test_vertex_neighbors_are_deduplicated() {
        let mesh = make_tetrahedron();
        let neighbors = vertex_neighbors(&mesh);
        assert_eq!(neighbors[0], vec![1, 2, 3]);
        assert_eq!(neighbors[3], vec![0, 1, 2]);
    }
}
