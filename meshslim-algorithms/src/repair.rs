//! Watertightness repair
//!
//! Hole detection and ear-clipping fill, breadth-first winding propagation
//! and outward orientation of closed components.

use crate::adjacency::{has_directed_edge, MeshAdjacency};
use itertools::Itertools;
use log::{debug, info, warn};
use meshslim_core::{to_f64, Error, Point3d, Point3f, Result, StageOutcome, TriangleMesh, Vector3d};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A closed loop of boundary edges.
///
/// The vertex order runs against the winding of the faces bordering the
/// hole, so triangles following the loop order close it with a consistent
/// orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    pub vertices: Vec<usize>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_valid(&self) -> bool {
        self.vertices.len() >= 3
    }
}

/// Trace the boundary edges of a mesh into closed loops.
///
/// # Errors
/// Returns [`Error::Algorithm`] when a vertex touches more than two boundary
/// edges (branching boundary) or a boundary does not close.
pub fn detect_holes(mesh: &TriangleMesh, adjacency: &MeshAdjacency) -> Result<Vec<BoundaryLoop>> {
    let boundary_edges = adjacency.boundary_edges();
    if boundary_edges.is_empty() {
        return Ok(Vec::new());
    }

    let mut edge_neighbors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &(a, b) in &boundary_edges {
        edge_neighbors.entry(a).or_default().push(b);
        edge_neighbors.entry(b).or_default().push(a);
    }
    if let Some((v, n)) = edge_neighbors.iter().find(|(_, n)| n.len() != 2) {
        return Err(Error::Algorithm(format!(
            "vertex {} touches {} boundary edges",
            v,
            n.len()
        )));
    }

    let mut visited: BTreeSet<usize> = BTreeSet::new();
    let mut loops = Vec::new();

    for &(start, _) in &boundary_edges {
        if visited.contains(&start) {
            continue;
        }

        let mut loop_vertices = vec![start];
        visited.insert(start);
        let mut prev = start;
        let mut current = edge_neighbors[&start][0];

        while current != start {
            if !visited.insert(current) {
                return Err(Error::Algorithm(format!(
                    "boundary starting at vertex {} does not close",
                    start
                )));
            }
            loop_vertices.push(current);
            let ring = &edge_neighbors[&current];
            let next = if ring[0] == prev { ring[1] } else { ring[0] };
            prev = current;
            current = next;
        }

        if loop_vertices.len() < 3 {
            return Err(Error::Algorithm(format!(
                "boundary at vertex {} has only {} edges",
                start,
                loop_vertices.len()
            )));
        }

        // run against the bordering face
        let (a, b) = (loop_vertices[0], loop_vertices[1]);
        if let Some(&fi) = adjacency.faces_of(a, b).first() {
            if has_directed_edge(&mesh.faces()[fi], a, b) {
                loop_vertices.reverse();
            }
        }

        loops.push(BoundaryLoop {
            vertices: loop_vertices,
        });
    }

    debug!(
        "Detected {} holes, sizes: {:?}",
        loops.len(),
        loops.iter().map(BoundaryLoop::edge_count).collect::<Vec<_>>()
    );
    Ok(loops)
}

/// Triangulate a boundary loop by ear clipping, with a fan over the
/// remaining vertices when no ear can be found.
pub fn fill_hole_ear_clipping(mesh: &TriangleMesh, boundary: &BoundaryLoop) -> Vec<[usize; 3]> {
    let n = boundary.vertices.len();
    if n < 3 {
        return Vec::new();
    }

    let positions: Vec<Point3d> = boundary
        .vertices
        .iter()
        .map(|&vi| to_f64(&mesh.vertices()[vi]))
        .collect();
    let hole_normal = compute_hole_normal(&positions);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count).find(|&i| {
            let prev = remaining[(i + count - 1) % count];
            let next = remaining[(i + 1) % count];
            is_ear(&positions, &remaining, prev, remaining[i], next, &hole_normal)
        });

        let Some(i) = ear else {
            warn!(
                "Ear clipping stuck with {} of {} vertices remaining, using a fan",
                count, n
            );
            break;
        };

        let prev = remaining[(i + count - 1) % count];
        let next = remaining[(i + 1) % count];
        triangles.push([
            boundary.vertices[prev],
            boundary.vertices[remaining[i]],
            boundary.vertices[next],
        ]);
        remaining.remove(i);
    }

    let center = remaining[0];
    for (&a, &b) in remaining[1..].iter().tuple_windows() {
        triangles.push([
            boundary.vertices[center],
            boundary.vertices[a],
            boundary.vertices[b],
        ]);
    }

    triangles
}

fn compute_hole_normal(positions: &[Point3d]) -> Vector3d {
    let centroid = positions
        .iter()
        .fold(Vector3d::zeros(), |acc, p| acc + p.coords)
        / positions.len() as f64;

    let normal = positions
        .iter()
        .circular_tuple_windows()
        .fold(Vector3d::zeros(), |acc, (p0, p1)| {
            acc + (p0.coords - centroid).cross(&(p1.coords - centroid))
        });

    let len = normal.norm();
    if len > f64::EPSILON {
        normal / len
    } else {
        Vector3d::z()
    }
}

fn is_ear(
    positions: &[Point3d],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3d,
) -> bool {
    let (a, b, c) = (positions[prev], positions[curr], positions[next]);
    let tri_normal = (b - a).cross(&(c - a));
    if tri_normal.norm() <= f64::EPSILON {
        return false;
    }
    if tri_normal.dot(hole_normal) <= 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_2d(&positions[idx], &a, &b, &c, hole_normal))
}

/// Point in triangle, projected by dropping the axis most aligned with `normal`.
fn point_in_triangle_2d(p: &Point3d, v0: &Point3d, v1: &Point3d, v2: &Point3d, normal: &Vector3d) -> bool {
    let abs = normal.abs();
    let project = |q: &Point3d| -> (f64, f64) {
        if abs.z >= abs.x && abs.z >= abs.y {
            (q.x, q.y)
        } else if abs.y >= abs.x {
            (q.x, q.z)
        } else {
            (q.y, q.z)
        }
    };
    let (p, a, b, c) = (project(p), project(v0), project(v1), project(v2));

    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| -> f64 {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Fill every hole with at most `max_hole_edges` edges.
///
/// Larger holes are left open with a warning, as are holes whose patch
/// would only repeat triangles already in the mesh (the loop around a lone
/// triangle is closed by that same triangle).
///
/// # Returns
/// The filled mesh and the number of holes filled.
///
/// # Errors
/// * [`Error::Algorithm`] when the boundary cannot be traced, or the filled
///   mesh would contain an edge shared by more than two triangles
pub fn fill_holes(mesh: &TriangleMesh, max_hole_edges: usize) -> Result<(TriangleMesh, usize)> {
    let adjacency = MeshAdjacency::from_mesh(mesh);
    let holes = detect_holes(mesh, &adjacency)?;

    let (fillable, too_large): (Vec<_>, Vec<_>) = holes
        .into_iter()
        .partition(|hole| hole.edge_count() <= max_hole_edges);

    for hole in &too_large {
        warn!(
            "Skipping hole with {} edges (max: {})",
            hole.edge_count(),
            max_hole_edges
        );
    }
    if fillable.is_empty() {
        return Ok((mesh.clone(), 0));
    }

    // a patch must not repeat an existing triangle with the other winding
    let mut existing: BTreeSet<[usize; 3]> = mesh.faces().iter().map(sorted_face).collect();
    let mut faces = mesh.faces().to_vec();
    let mut filled_count = 0;
    for hole in &fillable {
        let patch: Vec<[usize; 3]> = fill_hole_ear_clipping(mesh, hole)
            .into_iter()
            .filter(|face| existing.insert(sorted_face(face)))
            .collect();
        if patch.is_empty() {
            warn!(
                "Skipping hole with {} edges: its fill duplicates existing triangles",
                hole.edge_count()
            );
            continue;
        }
        faces.extend(patch);
        filled_count += 1;
    }
    if filled_count == 0 {
        return Ok((mesh.clone(), 0));
    }
    let mut filled = mesh.clone();
    filled.set_faces(faces);

    let non_manifold = MeshAdjacency::from_mesh(&filled).non_manifold_edges();
    if !non_manifold.is_empty() {
        return Err(Error::Algorithm(format!(
            "hole filling produced {} non-manifold edges",
            non_manifold.len()
        )));
    }

    info!("Filled {} holes", filled_count);
    Ok((filled, filled_count))
}

fn sorted_face(face: &[usize; 3]) -> [usize; 3] {
    let mut key = *face;
    key.sort_unstable();
    key
}

/// Per-face component labels after winding propagation
struct Orientation {
    faces: Vec<[usize; 3]>,
    component: Vec<usize>,
    component_count: usize,
    flipped: usize,
}

fn flip(face: &mut [usize; 3]) {
    face.swap(1, 2);
}

fn propagate_winding(mesh: &TriangleMesh, adjacency: &MeshAdjacency) -> Orientation {
    let mut faces = mesh.faces().to_vec();
    let mut component = vec![usize::MAX; faces.len()];
    let mut component_count = 0;
    let mut flipped = 0;

    for seed in 0..faces.len() {
        if component[seed] != usize::MAX {
            continue;
        }
        component[seed] = component_count;
        let mut queue = VecDeque::from([seed]);

        while let Some(fi) = queue.pop_front() {
            let face = faces[fi];
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let incident = adjacency.faces_of(a, b);
                if incident.len() != 2 {
                    continue;
                }
                let other = if incident[0] == fi { incident[1] } else { incident[0] };
                if component[other] != usize::MAX {
                    continue;
                }
                // the neighbour must walk b -> a
                if has_directed_edge(&faces[other], a, b) {
                    flip(&mut faces[other]);
                    flipped += 1;
                }
                component[other] = component_count;
                queue.push_back(other);
            }
        }
        component_count += 1;
    }

    Orientation {
        faces,
        component,
        component_count,
        flipped,
    }
}

/// Make the winding consistent across every edge shared by two triangles.
///
/// Each connected component keeps the orientation of its lowest-index
/// triangle.
///
/// # Returns
/// The reoriented mesh and the number of triangles flipped.
pub fn fix_winding(mesh: &TriangleMesh) -> (TriangleMesh, usize) {
    let adjacency = MeshAdjacency::from_mesh(mesh);
    let orientation = propagate_winding(mesh, &adjacency);

    let mut fixed = mesh.clone();
    if orientation.flipped > 0 {
        fixed.set_faces(orientation.faces);
    }
    (fixed, orientation.flipped)
}

/// Signed volume enclosed by the given triangles (divergence theorem)
fn signed_volume_of(vertices: &[Point3f], faces: impl Iterator<Item = [usize; 3]>) -> f64 {
    faces
        .map(|[a, b, c]| {
            let (a, b, c) = (to_f64(&vertices[a]), to_f64(&vertices[b]), to_f64(&vertices[c]));
            a.coords.dot(&b.coords.cross(&c.coords))
        })
        .sum::<f64>()
        / 6.0
}

/// Signed volume of the mesh. Positive for a closed mesh with outward normals.
pub fn signed_volume(mesh: &TriangleMesh) -> f64 {
    signed_volume_of(mesh.vertices(), mesh.faces().iter().copied())
}

/// Consistent winding plus outward orientation.
///
/// Runs [`fix_winding`], then flips every closed component whose signed
/// volume is negative.
///
/// # Returns
/// The reoriented mesh and the number of triangles flipped.
pub fn fix_normals(mesh: &TriangleMesh) -> (TriangleMesh, usize) {
    let adjacency = MeshAdjacency::from_mesh(mesh);
    let Orientation {
        mut faces,
        component,
        component_count,
        mut flipped,
    } = propagate_winding(mesh, &adjacency);

    let mut closed = vec![true; component_count];
    for (_, incident) in adjacency.edges() {
        if incident.len() != 2 {
            for &fi in incident {
                closed[component[fi]] = false;
            }
        }
    }

    for c in (0..component_count).filter(|&c| closed[c]) {
        let members: Vec<usize> = (0..faces.len()).filter(|&fi| component[fi] == c).collect();
        let volume = signed_volume_of(mesh.vertices(), members.iter().map(|&fi| faces[fi]));
        if volume < 0.0 {
            debug!("Flipping inward facing component of {} triangles", members.len());
            for fi in members {
                flip(&mut faces[fi]);
                flipped += 1;
            }
        }
    }

    let mut fixed = mesh.clone();
    if flipped > 0 {
        fixed.set_faces(faces);
    }
    (fixed, flipped)
}

/// Watertight repair stage.
///
/// Skipped when the mesh is already watertight. Otherwise holes of at most
/// `max_hole_edges` edges are filled and normals oriented outward; the result
/// is degraded when boundary edges remain. When hole filling fails only the
/// winding is fixed.
pub fn repair_watertight(mesh: &TriangleMesh, max_hole_edges: usize) -> StageOutcome {
    let adjacency = MeshAdjacency::from_mesh(mesh);
    if adjacency.is_watertight() {
        return StageOutcome::skipped("mesh is already watertight");
    }

    match fill_holes(mesh, max_hole_edges) {
        Ok((filled, holes)) => {
            let (oriented, flipped) = fix_normals(&filled);
            debug!("Filled {} holes, flipped {} triangles", holes, flipped);
            let remaining = MeshAdjacency::from_mesh(&oriented).boundary_edges().len();
            if remaining == 0 {
                StageOutcome::Success(oriented)
            } else {
                StageOutcome::degraded(
                    oriented,
                    format!("{} boundary edges remain after hole filling", remaining),
                )
            }
        }
        Err(e) => {
            warn!("Hole filling failed: {}; fixing winding only", e);
            let (fixed, _) = fix_winding(mesh);
            StageOutcome::degraded(fixed, format!("winding only: {}", e))
        }
    }
}
