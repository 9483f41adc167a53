//! Mesh smoothing
//!
//! - [`laplacian_smooth`]: umbrella Laplacian, shrinks the surface over
//!   many iterations
//! - [`taubin_smooth`]: alternating λ|μ steps that cancel most of the
//!   shrinkage
//!
//! Both use uniform weights over the deduplicated edge neighbours of each
//! vertex. Vertices with no neighbours keep their position.

use crate::adjacency::vertex_neighbors;
use log::{debug, warn};
use meshslim_core::{to_f32, to_f64, Error, Point3d, Result, StageOutcome, TriangleMesh, Vector3d};

/// Options for the smoothing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothOptions {
    /// Number of smoothing iterations. Zero disables the stage.
    pub iterations: usize,

    /// Positive step factor, in (0, 1).
    pub lambda: f32,

    /// Negative Taubin step factor, `mu < 0` and `|mu| >= lambda`.
    pub mu: f32,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            iterations: 20,
            lambda: 0.5,
            mu: -0.53,
        }
    }
}

impl SmoothOptions {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_mu(mut self, mu: f32) -> Self {
        self.mu = mu;
        self
    }
}

/// Performs plain umbrella-Laplacian smoothing.
///
/// Each iteration moves every vertex towards the centroid of its neighbours:
/// `p' = p + λ (c - p)`.
///
/// # Errors
/// * [`Error::Algorithm`] when `lambda` is outside `(0, 1]`, the mesh has
///   no edge, or a pass produces non-finite positions
pub fn laplacian_smooth(mesh: &TriangleMesh, iterations: usize, lambda: f32) -> Result<TriangleMesh> {
    if !(lambda > 0.0 && lambda <= 1.0) {
        return Err(Error::Algorithm(format!(
            "laplacian lambda must be in (0, 1], got {}",
            lambda
        )));
    }
    let neighbors = checked_neighbors(mesh)?;
    let mut positions: Vec<Point3d> = mesh.vertices().iter().map(to_f64).collect();

    for _ in 0..iterations {
        positions = umbrella_step(&positions, &neighbors, lambda as f64);
    }

    write_back(mesh, &positions)
}

/// Performs Taubin λ|μ smoothing.
///
/// Each iteration applies a shrinking umbrella step with factor `lambda`
/// followed by an inflating one with factor `mu`, so low-frequency shape is
/// kept while noise is removed. `iterations` counts λ|μ pairs: ten
/// iterations run twenty umbrella passes over the vertices.
///
/// # Errors
/// * [`Error::Algorithm`] unless `0 < lambda < 1`, `mu < 0` and
///   `|mu| >= lambda`, when the mesh has no edge, or when a pass produces
///   non-finite positions
pub fn taubin_smooth(mesh: &TriangleMesh, iterations: usize, lambda: f32, mu: f32) -> Result<TriangleMesh> {
    if !(lambda > 0.0 && lambda < 1.0) {
        return Err(Error::Algorithm(format!(
            "taubin lambda must be in (0, 1), got {}",
            lambda
        )));
    }
    if !(mu < 0.0) || mu.abs() < lambda {
        return Err(Error::Algorithm(format!(
            "taubin mu must be negative with |mu| >= lambda, got mu = {} and lambda = {}",
            mu, lambda
        )));
    }
    let neighbors = checked_neighbors(mesh)?;
    let mut positions: Vec<Point3d> = mesh.vertices().iter().map(to_f64).collect();

    for _ in 0..iterations {
        positions = umbrella_step(&positions, &neighbors, lambda as f64);
        positions = umbrella_step(&positions, &neighbors, mu as f64);
    }

    write_back(mesh, &positions)
}

/// Smoothing stage: Taubin, falling back to Laplacian with the same lambda
/// and iteration count. Skipped when `iterations` is zero or both fail.
pub fn smooth(mesh: &TriangleMesh, options: &SmoothOptions) -> StageOutcome {
    if options.iterations == 0 {
        return StageOutcome::skipped("smoothing disabled");
    }

    match taubin_smooth(mesh, options.iterations, options.lambda, options.mu) {
        Ok(smoothed) => {
            debug!(
                "Taubin smoothing: {} iterations, lambda {}, mu {}",
                options.iterations, options.lambda, options.mu
            );
            StageOutcome::Success(smoothed)
        }
        Err(taubin_err) => {
            warn!("Taubin smoothing failed: {}; trying Laplacian", taubin_err);
            match laplacian_smooth(mesh, options.iterations, options.lambda) {
                Ok(smoothed) => StageOutcome::degraded(
                    smoothed,
                    format!("laplacian fallback after: {}", taubin_err),
                ),
                Err(laplacian_err) => StageOutcome::skipped(format!(
                    "taubin: {}; laplacian: {}",
                    taubin_err, laplacian_err
                )),
            }
        }
    }
}

fn checked_neighbors(mesh: &TriangleMesh) -> Result<Vec<Vec<usize>>> {
    let neighbors = vertex_neighbors(mesh);
    if neighbors.iter().all(Vec::is_empty) {
        return Err(Error::Algorithm("mesh has no edges to smooth along".to_string()));
    }
    Ok(neighbors)
}

fn umbrella_step(positions: &[Point3d], neighbors: &[Vec<usize>], factor: f64) -> Vec<Point3d> {
    positions
        .iter()
        .zip(neighbors)
        .map(|(p, ring)| {
            if ring.is_empty() {
                return *p;
            }
            let sum: Vector3d = ring.iter().map(|&n| positions[n].coords).sum();
            let centroid = sum / ring.len() as f64;
            *p + (centroid - p.coords) * factor
        })
        .collect()
}

fn write_back(mesh: &TriangleMesh, positions: &[Point3d]) -> Result<TriangleMesh> {
    if let Some(vi) = positions
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(Error::Algorithm(format!(
            "smoothing produced a non-finite position at vertex {}",
            vi
        )));
    }
    let mut smoothed = mesh.clone();
    for (dst, src) in smoothed.vertices_mut().iter_mut().zip(positions) {
        *dst = to_f32(src);
    }
    Ok(smoothed)
}
