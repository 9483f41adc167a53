//! End-to-end tests for the optimization pipeline and batch runner

use approx::assert_relative_eq;
use meshslim_pipeline::algorithms::{is_watertight, is_winding_consistent};
use meshslim_pipeline::{
    optimize, optimize_with_report, BatchOptions, BatchRunner, BatchSummary, Error,
    OptimizationParams, Point3f, Stage, StageStatus, TriangleMesh,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cube_vertices() -> Vec<Point3f> {
    vec![
        Point3f::new(0.0, 0.0, 0.0),
        Point3f::new(1.0, 0.0, 0.0),
        Point3f::new(1.0, 1.0, 0.0),
        Point3f::new(0.0, 1.0, 0.0),
        Point3f::new(0.0, 0.0, 1.0),
        Point3f::new(1.0, 0.0, 1.0),
        Point3f::new(1.0, 1.0, 1.0),
        Point3f::new(0.0, 1.0, 1.0),
    ]
}

fn cube_faces() -> Vec<[usize; 3]> {
    vec![
        [0, 2, 1], [0, 3, 2],
        [4, 5, 6], [4, 6, 7],
        [0, 1, 5], [0, 5, 4],
        [2, 3, 7], [2, 7, 6],
        [1, 2, 6], [1, 6, 5],
        [0, 4, 7], [0, 7, 3],
    ]
}

fn make_cube() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(cube_vertices(), cube_faces())
}

/// Closed, outward wound sphere; `2 * slices * (stacks - 1)` triangles.
fn make_uv_sphere(stacks: usize, slices: usize, radius: f32) -> TriangleMesh {
    let mut vertices = vec![Point3f::new(0.0, 0.0, radius)];
    for i in 1..stacks {
        let theta = std::f32::consts::PI * i as f32 / stacks as f32;
        for j in 0..slices {
            let phi = 2.0 * std::f32::consts::PI * j as f32 / slices as f32;
            vertices.push(Point3f::new(
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos(),
            ));
        }
    }
    vertices.push(Point3f::new(0.0, 0.0, -radius));
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

fn add_noise(mesh: &mut TriangleMesh, amplitude: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for p in mesh.vertices_mut() {
        p.x += rng.gen_range(-amplitude..amplitude);
        p.y += rng.gen_range(-amplitude..amplitude);
        p.z += rng.gen_range(-amplitude..amplitude);
    }
}

#[test]
fn test_cube_duplicate_vertex_is_welded() {
    init_logger();

    let mut vertices = cube_vertices();
    vertices.push(Point3f::new(1e-7, 0.0, 0.0));
    // the bottom face uses the duplicate of vertex 0
    let mut faces = cube_faces();
    faces[0] = [8, 2, 1];
    faces[1] = [8, 3, 2];
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let params = OptimizationParams::default()
        .with_merge_distance(1e-5)
        .with_taubin(0, 0.5, -0.53)
        .with_fix_coordinate(false);
    let result = optimize_with_report(mesh, &params).unwrap();
    let out = &result.mesh;

    assert_eq!(out.vertex_count(), 8);
    assert_eq!(out.face_count(), 12);
    for area in out.face_areas() {
        assert_relative_eq!(area, 0.5, epsilon = 1e-6);
    }
    assert!(is_watertight(out));
    assert_eq!(result.status(Stage::WeldEarly), Some(StageStatus::Success));
    assert_eq!(result.report(Stage::WeldEarly).map(|r| r.vertices), Some(8));
    assert_eq!(result.status(Stage::RepairWatertight), Some(StageStatus::Skipped));
}

#[test]
fn test_tiny_triangle_removed_when_others_remain() {
    init_logger();

    let mut vertices = cube_vertices();
    vertices.push(Point3f::new(5.0, 5.0, 5.0));
    vertices.push(Point3f::new(5.0001, 5.0, 5.0));
    vertices.push(Point3f::new(5.0, 5.0002, 5.0));
    let mut faces = cube_faces();
    faces.push([8, 9, 10]);
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let params = OptimizationParams::default()
        .with_min_face_area(1e-6)
        .with_taubin(0, 0.5, -0.53)
        .with_fix_coordinate(false);
    let result = optimize_with_report(mesh, &params).unwrap();

    assert_eq!(result.status(Stage::FilterFaces), Some(StageStatus::Success));
    assert_eq!(result.mesh.face_count(), 12);
    assert_eq!(result.mesh.vertex_count(), 8);
}

#[test]
fn test_tiny_triangle_kept_when_alone() {
    init_logger();

    let mesh = TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1e-4, 0.0, 0.0),
            Point3f::new(0.0, 2e-4, 0.0),
        ],
        vec![[0, 1, 2]],
    );
    let params = OptimizationParams::default()
        .with_min_face_area(1e-6)
        .with_taubin(0, 0.5, -0.53)
        .with_watertight(false)
        .with_fix_coordinate(false);
    let result = optimize_with_report(mesh, &params).unwrap();

    assert_eq!(result.status(Stage::FilterFaces), Some(StageStatus::Degraded));
    assert!(result.has_warnings());
    assert_eq!(result.mesh.face_count(), 1);
    assert_eq!(result.mesh.vertex_count(), 3);
}

#[test]
fn test_sphere_decimated_to_target() {
    init_logger();

    let mesh = make_uv_sphere(50, 100, 1.0);
    assert_eq!(mesh.face_count(), 9800);
    assert!(is_watertight(&mesh));

    let params = OptimizationParams::default().with_target_faces(100);
    let result = optimize_with_report(mesh, &params).unwrap();
    let out = &result.mesh;

    assert!(out.face_count() >= 4);
    assert!(out.face_count() <= 100, "{} triangles", out.face_count());
    assert!(is_watertight(out));
    assert!(is_winding_consistent(out));
    assert_eq!(result.status(Stage::Simplify), Some(StageStatus::Success));
}

#[test]
fn test_keep_ratio_halves_triangles() {
    init_logger();

    let mesh = make_uv_sphere(20, 40, 2.0);
    let input_faces = mesh.face_count();
    let params = OptimizationParams::default().with_keep_ratio(0.5);
    let out = optimize(mesh, &params).unwrap();
    assert!(out.face_count() <= input_faces / 2);
    assert!(out.face_count() >= 4);
}

#[test]
fn test_centroid_is_preserved() {
    init_logger();

    let mut mesh = make_uv_sphere(16, 32, 1.5);
    add_noise(&mut mesh, 0.05, 7);
    let offset = meshslim_pipeline::Vector3f::new(12.0, -3.0, 40.0);
    mesh.translate(&offset);
    let before = mesh.centroid();

    let params = OptimizationParams::default()
        .with_keep_ratio(0.4)
        .with_fix_coordinate(false);
    let out = optimize(mesh, &params).unwrap();

    assert_relative_eq!(out.centroid(), before, epsilon = 1e-3);
}

#[test]
fn test_clean_mesh_round_trip() {
    init_logger();

    let input = make_cube();
    let params = OptimizationParams::default().with_taubin(0, 0.5, -0.53);
    let out = optimize(input.clone(), &params).unwrap();

    // Z-up to Y-up: (x, y, z) -> (x, z, -y)
    assert_eq!(out.faces(), input.faces());
    assert_eq!(out.vertex_count(), input.vertex_count());
    for (p, q) in input.vertices().iter().zip(out.vertices()) {
        assert_relative_eq!(*q, Point3f::new(p.x, p.z, -p.y), epsilon = 1e-5);
    }
    assert_eq!(out.normals().map(|n| n.len()), Some(8));
    assert_eq!(out.face_normals().map(|n| n.len()), Some(12));
}

#[test]
fn test_triangle_soup_never_empty() {
    init_logger();

    let mut rng = StdRng::seed_from_u64(42);
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for _ in 0..300 {
        let base = vertices.len();
        for _ in 0..3 {
            vertices.push(Point3f::new(
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
            ));
        }
        faces.push([base, base + 1, base + 2]);
    }
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let params = OptimizationParams::default().with_keep_ratio(0.2);
    let out = optimize(mesh, &params).unwrap();
    assert!(out.face_count() > 0);
    assert!(out.vertex_count() > 0);
    assert!(out.validate().is_ok());
    assert!(out.has_normals());
}

#[test]
fn test_open_mesh_is_closed() {
    init_logger();

    // cube without its top face
    let faces: Vec<[usize; 3]> = cube_faces()
        .into_iter()
        .filter(|f| *f != [4, 5, 6] && *f != [4, 6, 7])
        .collect();
    let mesh = TriangleMesh::from_vertices_and_faces(cube_vertices(), faces);

    let params = OptimizationParams::default()
        .with_taubin(0, 0.5, -0.53)
        .with_fix_coordinate(false);
    let result = optimize_with_report(mesh, &params).unwrap();

    assert_eq!(result.status(Stage::RepairWatertight), Some(StageStatus::Success));
    assert_eq!(result.mesh.face_count(), 12);
    assert!(is_watertight(&result.mesh));
}

#[test]
fn test_fatal_inputs() {
    init_logger();

    let params = OptimizationParams::default();
    assert!(matches!(optimize(TriangleMesh::new(), &params), Err(Error::EmptyMesh(_))));

    let no_faces = TriangleMesh::from_vertices_and_faces(cube_vertices(), Vec::new());
    assert!(matches!(optimize(no_faces, &params), Err(Error::EmptyMesh(_))));

    let nan = TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, f32::NAN, 0.0),
        ],
        vec![[0, 1, 2]],
    );
    assert!(matches!(optimize(nan, &params), Err(Error::InvalidData(_))));
}

#[test]
fn test_non_finite_vertices_dropped_at_load() {
    init_logger();

    let params = OptimizationParams::default()
        .with_taubin(0, 0.5, -0.53)
        .with_fix_coordinate(false);

    // stray NaN vertex that no triangle uses
    let sphere = make_uv_sphere(8, 16, 1.0);
    let mut mesh = sphere.clone();
    mesh.add_vertex(Point3f::new(f32::NAN, 0.0, 0.0));
    let result = optimize_with_report(mesh, &params).unwrap();
    assert_eq!(result.mesh.face_count(), sphere.face_count());
    assert_eq!(result.mesh.vertex_count(), sphere.vertex_count());
    assert!(result.mesh.vertices().iter().all(|p| p.coords.iter().all(|c| c.is_finite())));
    assert_eq!(result.status(Stage::Load), Some(StageStatus::Degraded));
    assert!(is_watertight(&result.mesh));

    // vertex 3 is used by three cube triangles; the rest survive
    let mut vertices = cube_vertices();
    vertices[3] = Point3f::new(f32::NAN, 0.0, 0.0);
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, cube_faces());
    let result = optimize_with_report(mesh, &params.clone().with_watertight(false)).unwrap();
    assert_eq!(result.mesh.face_count(), 9);
    assert_eq!(result.mesh.vertex_count(), 7);
    assert_eq!(result.report(Stage::Load).map(|r| r.faces), Some(9));
}

#[test]
fn test_batch_isolates_failures() {
    init_logger();

    let runner = BatchRunner::new(
        OptimizationParams::default().with_target_faces(200),
        BatchOptions::default().with_threads(2),
    )
    .unwrap();
    let items = runner.run(vec![
        ("sphere".to_string(), make_uv_sphere(20, 40, 1.0)),
        ("empty".to_string(), TriangleMesh::new()),
        ("cube".to_string(), make_cube()),
    ]);

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].name, "sphere");
    assert!(items[0].is_ok());
    assert!(matches!(items[1].result, Err(Error::EmptyMesh(_))));
    assert!(items[2].is_ok());

    let summary = BatchSummary::from_items(&items);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.timed_out, 0);
}

#[test]
fn test_batch_timeout_fails_only_affected_meshes() {
    init_logger();

    let runner = BatchRunner::new(
        OptimizationParams::default(),
        BatchOptions::default().with_timeout(Duration::ZERO),
    )
    .unwrap();
    let items = runner.run(vec![
        ("a".to_string(), make_cube()),
        ("b".to_string(), make_uv_sphere(8, 16, 1.0)),
    ]);

    assert!(items.iter().all(|item| item.is_timeout()));
    let summary = BatchSummary::from_items(&items);
    assert_eq!(summary.timed_out, 2);
    assert_eq!(summary.succeeded, 0);
}
