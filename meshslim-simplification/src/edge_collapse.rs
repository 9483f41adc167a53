//! Quadric edge-collapse decimation
//!
//! Garland & Heckbert style decimation: edges are collapsed cheapest first,
//! where the cost is the summed quadric error of the two endpoints at the
//! collapse position. Local topology (fans, boundaries, link condition) is
//! answered by a half-edge structure that is updated in place.

use crate::quadric_error::{minimize_quadric, quadric_error_at, vertex_quadrics, Quadric};
use crate::{MeshSimplifier, MIN_FACES};
use log::debug;
use meshslim_core::{to_f32, to_f64, Deadline, Point3d, Point3f, Result, TriangleMesh};
use priority_queue::PriorityQueue;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

const INVALID: usize = usize::MAX;

/// Collapses between two full queue rebuilds
const REBUILD_INTERVAL: usize = 100;

/// Collapses between two deadline checks
const DEADLINE_INTERVAL: usize = 64;

// ============================================================
// Half-Edge Data Structure
// ============================================================

#[derive(Debug, Clone)]
struct HalfEdge {
    target: usize,
    twin: usize,
    next: usize,
    prev: usize,
    face: usize,
}

/// Half-edge mesh for topology-aware edge collapse operations.
///
/// Only edges walked once in each direction by exactly two triangles get a
/// twin; non-manifold and inconsistently wound edges behave as boundaries.
/// Vertices whose triangles do not form a single fan are locked and never
/// take part in a collapse.
struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
    /// One outgoing half-edge per vertex (INVALID if removed)
    vertex_edge: Vec<usize>,
    /// One half-edge per face (INVALID if removed)
    face_edge: Vec<usize>,
    active_face_count: usize,
    positions: Vec<Point3f>,
    quadrics: Vec<Quadric>,
    vertex_removed: Vec<bool>,
    locked: Vec<bool>,
}

impl HalfEdgeMesh {
    fn from_triangle_mesh(mesh: &TriangleMesh) -> Self {
        let nv = mesh.vertex_count();
        let nf = mesh.face_count();

        let mut half_edges = Vec::with_capacity(nf * 3);
        let mut vertex_edge = vec![INVALID; nv];
        let mut face_edge = Vec::with_capacity(nf);
        let mut incident_faces = vec![0usize; nv];
        let mut active_face_count = 0;

        for (fi, face) in mesh.faces().iter().enumerate() {
            let base = fi * 3;
            let usable = face[0] != face[1] && face[1] != face[2] && face[0] != face[2];
            for j in 0..3usize {
                half_edges.push(HalfEdge {
                    target: face[(j + 1) % 3],
                    twin: INVALID,
                    next: base + (j + 1) % 3,
                    prev: base + (j + 2) % 3,
                    face: if usable { fi } else { INVALID },
                });
                if usable {
                    incident_faces[face[j]] += 1;
                    if vertex_edge[face[j]] == INVALID {
                        vertex_edge[face[j]] = base + j;
                    }
                }
            }
            if usable {
                face_edge.push(base);
                active_face_count += 1;
            } else {
                face_edge.push(INVALID);
            }
        }

        // Build twin pointers
        let mut directed: HashMap<(usize, usize), Vec<usize>> = HashMap::with_capacity(nf * 3);
        for (he_idx, he) in half_edges.iter().enumerate() {
            if he.face == INVALID {
                continue;
            }
            let src = half_edges[he.prev].target;
            directed.entry((src, he.target)).or_default().push(he_idx);
        }
        for (&(src, tgt), forward) in &directed {
            if src > tgt || forward.len() != 1 {
                continue;
            }
            if let Some(backward) = directed.get(&(tgt, src)) {
                if backward.len() == 1 {
                    half_edges[forward[0]].twin = backward[0];
                    half_edges[backward[0]].twin = forward[0];
                }
            }
        }

        let mut hem = HalfEdgeMesh {
            half_edges,
            vertex_edge,
            face_edge,
            active_face_count,
            positions: mesh.vertices().to_vec(),
            quadrics: vertex_quadrics(mesh),
            vertex_removed: vec![false; nv],
            locked: vec![false; nv],
        };

        for v in 0..nv {
            if hem.vertex_edge[v] != INVALID && hem.outgoing_half_edges(v).len() != incident_faces[v] {
                hem.locked[v] = true;
            }
        }
        hem
    }

    #[inline]
    fn source(&self, he: usize) -> usize {
        self.half_edges[self.half_edges[he].prev].target
    }

    /// Get all outgoing half-edges from a vertex (handles boundary vertices).
    fn outgoing_half_edges(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_edge[v];
        if start == INVALID {
            return vec![];
        }

        let limit = self.half_edges.len();
        let mut result = Vec::new();
        let mut current = start;

        // Rotate counterclockwise: current.prev.twin
        loop {
            result.push(current);
            let prev = self.half_edges[current].prev;
            let twin = self.half_edges[prev].twin;
            if twin == INVALID || result.len() > limit {
                break;
            }
            current = twin;
            if current == start {
                return result;
            }
        }

        // Boundary: also rotate clockwise from start via twin.next
        let twin_of_start = self.half_edges[start].twin;
        if twin_of_start != INVALID {
            let mut current = self.half_edges[twin_of_start].next;
            while current != start && result.len() <= limit {
                result.push(current);
                let twin = self.half_edges[current].twin;
                if twin == INVALID {
                    break;
                }
                current = self.half_edges[twin].next;
            }
        }

        result
    }

    /// One-ring of a vertex, including the far end of an incoming boundary edge.
    fn neighbors(&self, v: usize) -> BTreeSet<usize> {
        let mut ring = BTreeSet::new();
        for he in self.outgoing_half_edges(v) {
            ring.insert(self.half_edges[he].target);
            let next = self.half_edges[he].next;
            ring.insert(self.half_edges[next].target);
        }
        ring
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.outgoing_half_edges(v).iter().any(|&he| {
            self.half_edges[he].twin == INVALID
                || self.half_edges[self.half_edges[he].prev].twin == INVALID
        })
    }

    fn find_half_edge(&self, from: usize, to: usize) -> Option<usize> {
        self.outgoing_half_edges(from)
            .into_iter()
            .find(|&he| self.half_edges[he].target == to)
    }

    /// Topology and geometry checks for collapsing `h = (v1 -> v2)` to `new_pos`.
    fn can_collapse(&self, h: usize, v1: usize, v2: usize, new_pos: &Point3f) -> bool {
        if self.locked[v1] || self.locked[v2] {
            return false;
        }

        let h_twin = self.half_edges[h].twin;
        let is_boundary_edge = h_twin == INVALID;
        let v1_boundary = self.is_boundary_vertex(v1);
        let v2_boundary = self.is_boundary_vertex(v2);

        // an interior edge between two boundary vertices would pinch the surface
        if !is_boundary_edge && v1_boundary && v2_boundary {
            return false;
        }

        // Link condition: common neighbors are exactly the opposite apices
        let n1 = self.neighbors(v1);
        let n2 = self.neighbors(v2);
        let expected = if is_boundary_edge { 1 } else { 2 };
        if n1.intersection(&n2).count() != expected {
            return false;
        }

        let merged = n1.union(&n2).filter(|&&n| n != v1 && n != v2).count();
        let min_merged = if v1_boundary || v2_boundary { 2 } else { 3 };
        if merged < min_merged {
            return false;
        }

        // apices lose one neighbour each
        let mut apices = vec![self.half_edges[self.half_edges[h].next].target];
        if !is_boundary_edge {
            apices.push(self.half_edges[self.half_edges[h_twin].next].target);
        }
        for apex in apices {
            let min_valence = if self.is_boundary_vertex(apex) { 3 } else { 4 };
            if self.neighbors(apex).len() < min_valence {
                return false;
            }
        }

        !self.flips_face(v1, v2, new_pos) && !self.flips_face(v2, v1, new_pos)
    }

    /// Whether moving `v` to `new_pos` turns over a face that does not
    /// contain `other`.
    fn flips_face(&self, v: usize, other: usize, new_pos: &Point3f) -> bool {
        let new_pos = to_f64(new_pos);
        let old_pos = to_f64(&self.positions[v]);

        self.outgoing_half_edges(v).into_iter().any(|he| {
            let a = self.half_edges[he].target;
            let b = self.half_edges[self.half_edges[he].next].target;
            if a == other || b == other {
                return false;
            }
            let (pa, pb) = (to_f64(&self.positions[a]), to_f64(&self.positions[b]));
            let before = (pa - old_pos).cross(&(pb - old_pos));
            let after = (pa - new_pos).cross(&(pb - new_pos));
            after.dot(&before) <= 0.0
        })
    }

    /// Optimal position and quadric cost for collapsing `(v1, v2)`.
    fn compute_collapse_cost(&self, v1: usize, v2: usize) -> (Point3f, f64) {
        let q = self.quadrics[v1] + self.quadrics[v2];
        let p1 = to_f64(&self.positions[v1]);
        let p2 = to_f64(&self.positions[v2]);
        let midpoint = Point3d::from((p1.coords + p2.coords) * 0.5);
        let edge_length = (p2 - p1).norm();

        // keep the solved point near the edge on almost flat or cylindrical patches
        let optimal = minimize_quadric(&q)
            .filter(|p| (p - midpoint).norm() <= 2.0 * edge_length)
            .unwrap_or(midpoint);

        (to_f32(&optimal), quadric_error_at(&optimal, &q))
    }

    /// Find any valid outgoing half-edge from a vertex (linear scan fallback).
    fn find_valid_outgoing(&self, v: usize) -> usize {
        for (i, he) in self.half_edges.iter().enumerate() {
            if he.face != INVALID && self.source(i) == v {
                return i;
            }
        }
        INVALID
    }

    /// Collapse edge `h = (v1 -> v2)`, merging v2 into v1 at new_pos.
    fn collapse_edge(&mut self, h: usize, v1: usize, v2: usize, new_pos: Point3f) {
        let h_twin = self.half_edges[h].twin;
        let h_next = self.half_edges[h].next;
        let h_prev = self.half_edges[h].prev;
        let face_a = self.half_edges[h].face;
        let h_next_twin = self.half_edges[h_next].twin;
        let h_prev_twin = self.half_edges[h_prev].twin;
        let c = self.half_edges[h_next].target;

        let (face_b, ht_next, ht_prev, ht_next_twin, ht_prev_twin, d) = if h_twin != INVALID {
            let hn = self.half_edges[h_twin].next;
            let hp = self.half_edges[h_twin].prev;
            (
                self.half_edges[h_twin].face,
                hn,
                hp,
                self.half_edges[hn].twin,
                self.half_edges[hp].twin,
                self.half_edges[hn].target,
            )
        } else {
            (INVALID, INVALID, INVALID, INVALID, INVALID, INVALID)
        };

        // Collect v2 outgoing edges BEFORE any modifications
        let v2_outgoing = self.outgoing_half_edges(v2);

        // Re-pair twins for face A border edges
        if h_next_twin != INVALID {
            self.half_edges[h_next_twin].twin = h_prev_twin;
        }
        if h_prev_twin != INVALID {
            self.half_edges[h_prev_twin].twin = h_next_twin;
        }

        self.half_edges[h].face = INVALID;
        self.half_edges[h_next].face = INVALID;
        self.half_edges[h_prev].face = INVALID;
        self.face_edge[face_a] = INVALID;
        self.active_face_count -= 1;

        if face_b != INVALID {
            if ht_next_twin != INVALID {
                self.half_edges[ht_next_twin].twin = ht_prev_twin;
            }
            if ht_prev_twin != INVALID {
                self.half_edges[ht_prev_twin].twin = ht_next_twin;
            }
            self.half_edges[h_twin].face = INVALID;
            self.half_edges[ht_next].face = INVALID;
            self.half_edges[ht_prev].face = INVALID;
            self.face_edge[face_b] = INVALID;
            self.active_face_count -= 1;
        }

        // Redirect all v2 references to v1
        for &he in &v2_outgoing {
            let prev = self.half_edges[he].prev;
            self.half_edges[prev].target = v1;

            let twin = self.half_edges[he].twin;
            if twin != INVALID && self.half_edges[twin].face != INVALID {
                self.half_edges[twin].target = v1;
            }
        }

        if self.half_edges[self.vertex_edge[v1]].face == INVALID {
            if h_prev_twin != INVALID && self.half_edges[h_prev_twin].face != INVALID {
                self.vertex_edge[v1] = h_prev_twin;
            } else {
                self.vertex_edge[v1] = self.find_valid_outgoing(v1);
            }
        }

        if self.vertex_edge[c] != INVALID && self.half_edges[self.vertex_edge[c]].face == INVALID {
            if h_next_twin != INVALID && self.half_edges[h_next_twin].face != INVALID {
                self.vertex_edge[c] = h_next_twin;
            } else {
                self.vertex_edge[c] = self.find_valid_outgoing(c);
            }
        }

        if d != INVALID
            && d != c
            && self.vertex_edge[d] != INVALID
            && self.half_edges[self.vertex_edge[d]].face == INVALID
        {
            if ht_next_twin != INVALID && self.half_edges[ht_next_twin].face != INVALID {
                self.vertex_edge[d] = ht_next_twin;
            } else {
                self.vertex_edge[d] = self.find_valid_outgoing(d);
            }
        }

        self.vertex_edge[v2] = INVALID;
        self.vertex_removed[v2] = true;

        let v2_quadric = self.quadrics[v2];
        self.positions[v1] = new_pos;
        self.quadrics[v1] += v2_quadric;
    }

    fn to_triangle_mesh(&self) -> TriangleMesh {
        let mut old_to_new = vec![INVALID; self.positions.len()];
        let mut new_positions = Vec::new();

        for (i, &removed) in self.vertex_removed.iter().enumerate() {
            if !removed && self.vertex_edge[i] != INVALID {
                old_to_new[i] = new_positions.len();
                new_positions.push(self.positions[i]);
            }
        }

        let mut new_faces = Vec::with_capacity(self.active_face_count);
        for &he0 in &self.face_edge {
            if he0 == INVALID {
                continue;
            }
            let he1 = self.half_edges[he0].next;
            let face = [
                old_to_new[self.source(he0)],
                old_to_new[self.half_edges[he0].target],
                old_to_new[self.half_edges[he1].target],
            ];
            if face.contains(&INVALID) {
                continue;
            }
            if face[0] != face[1] && face[1] != face[2] && face[2] != face[0] {
                new_faces.push(face);
            }
        }

        TriangleMesh::from_vertices_and_faces(new_positions, new_faces)
    }
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first
        other.cost.total_cmp(&self.cost)
    }
}

// ============================================================
// Edge Collapse Simplifier
// ============================================================

/// Edge collapse mesh simplifier using half-edge data structure and QEM.
///
/// This simplifier builds a half-edge mesh for efficient local topology
/// queries (neighbor iteration, boundary detection, link condition checks)
/// and uses quadric error metrics to prioritize edge collapses.
#[derive(Debug, Clone)]
pub struct EdgeCollapseSimplifier {
    /// Stop when the minimum collapse cost exceeds this threshold
    pub error_threshold: Option<f64>,
    /// Never collapse edges touching the mesh boundary
    pub preserve_boundary: bool,
    /// Extra penalty added to the cost of edges touching the boundary
    pub boundary_weight: f64,
    /// Checked every few collapses; an expired deadline aborts decimation
    pub deadline: Deadline,
}

impl Default for EdgeCollapseSimplifier {
    fn default() -> Self {
        Self {
            error_threshold: None,
            preserve_boundary: false,
            boundary_weight: 100.0,
            deadline: Deadline::none(),
        }
    }
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(
        error_threshold: Option<f64>,
        preserve_boundary: bool,
        boundary_weight: f64,
    ) -> Self {
        Self {
            error_threshold,
            preserve_boundary,
            boundary_weight,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Collapse cost including the boundary policy, `None` when the edge
    /// may not be collapsed at all.
    fn edge_cost(&self, hem: &HalfEdgeMesh, v1: usize, v2: usize) -> Option<f64> {
        let on_boundary = hem.is_boundary_vertex(v1) || hem.is_boundary_vertex(v2);
        if on_boundary && self.preserve_boundary {
            return None;
        }
        let (_, mut cost) = hem.compute_collapse_cost(v1, v2);
        if on_boundary {
            cost += self.boundary_weight;
        }
        Some(cost)
    }

    fn push_edge(
        &self,
        hem: &HalfEdgeMesh,
        queue: &mut PriorityQueue<usize, EdgeCost>,
        next_id: &mut usize,
        v1: usize,
        v2: usize,
    ) {
        if hem.locked[v1] || hem.locked[v2] {
            return;
        }
        if let Some(cost) = self.edge_cost(hem, v1, v2) {
            queue.push(*next_id, EdgeCost { v1, v2, cost });
            *next_id += 1;
        }
    }

    /// Build the priority queue of edge collapse candidates.
    fn build_queue(&self, hem: &HalfEdgeMesh, next_id: &mut usize) -> PriorityQueue<usize, EdgeCost> {
        let mut queue = PriorityQueue::new();
        let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();

        for vi in 0..hem.positions.len() {
            if hem.vertex_removed[vi] || hem.vertex_edge[vi] == INVALID {
                continue;
            }
            for he in hem.outgoing_half_edges(vi) {
                if hem.half_edges[he].face == INVALID {
                    continue;
                }
                let target = hem.half_edges[he].target;
                if !seen_edges.insert((vi.min(target), vi.max(target))) {
                    continue;
                }
                self.push_edge(hem, &mut queue, next_id, vi, target);
            }
        }

        queue
    }

    /// Collapse edges until at most `target_faces` triangles remain or no
    /// valid collapse is left.
    fn decimate(&self, mesh: &TriangleMesh, target_faces: usize) -> Result<TriangleMesh> {
        let mut hem = HalfEdgeMesh::from_triangle_mesh(mesh);
        let mut next_id = 0usize;
        let mut queue = self.build_queue(&hem, &mut next_id);
        let mut collapse_count = 0usize;
        let mut since_rebuild = 0usize;

        while hem.active_face_count > target_faces {
            let Some((_, edge_cost)) = queue.pop() else {
                if since_rebuild == 0 {
                    break;
                }
                queue = self.build_queue(&hem, &mut next_id);
                since_rebuild = 0;
                continue;
            };

            if let Some(threshold) = self.error_threshold {
                if edge_cost.cost > threshold {
                    break;
                }
            }

            let (v1, v2) = (edge_cost.v1, edge_cost.v2);

            // Validate: both vertices still alive and still neighbors
            if hem.vertex_removed[v1]
                || hem.vertex_removed[v2]
                || hem.vertex_edge[v1] == INVALID
                || hem.vertex_edge[v2] == INVALID
            {
                continue;
            }
            // boundary edges exist in one direction only
            let (v1, v2, h) = match hem.find_half_edge(v1, v2) {
                Some(h) => (v1, v2, h),
                None => match hem.find_half_edge(v2, v1) {
                    Some(h) => (v2, v1, h),
                    None => continue,
                },
            };

            // Stale entry whose cost has grown: requeue at the current cost
            let Some(cost) = self.edge_cost(&hem, v1, v2) else {
                continue;
            };
            if cost > edge_cost.cost {
                queue.push(next_id, EdgeCost { v1, v2, cost });
                next_id += 1;
                continue;
            }

            let (pos, _) = hem.compute_collapse_cost(v1, v2);
            if !hem.can_collapse(h, v1, v2, &pos) {
                continue;
            }

            hem.collapse_edge(h, v1, v2, pos);
            collapse_count += 1;
            since_rebuild += 1;

            if collapse_count % DEADLINE_INTERVAL == 0 {
                self.deadline.check("edge collapse")?;
            }

            if since_rebuild % REBUILD_INTERVAL == 0 {
                queue = self.build_queue(&hem, &mut next_id);
            } else {
                for n in hem.neighbors(v1) {
                    self.push_edge(&hem, &mut queue, &mut next_id, v1, n);
                }
            }
        }

        debug!(
            "Edge collapse: {} collapses, {} -> {} triangles (target {})",
            collapse_count,
            mesh.face_count(),
            hem.active_face_count,
            target_faces
        );
        Ok(hem.to_triangle_mesh())
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn simplify_to(&self, mesh: &TriangleMesh, target_faces: usize) -> Result<TriangleMesh> {
        mesh.validate()?;
        let target_faces = target_faces.max(MIN_FACES);
        if mesh.face_count() <= target_faces {
            return Ok(mesh.clone());
        }
        self.decimate(mesh, target_faces)
    }
}
