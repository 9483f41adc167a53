//! Vertex welding
//!
//! Two merge rules are provided. [`weld_by_distance`] merges vertices that
//! lie strictly closer than an absolute distance, using a spatial hash.
//! [`weld_by_precision`] merges vertices whose coordinates agree after
//! rounding to a number of decimal places; [`weld_digits`] converts an
//! absolute tolerance into that number using the mesh scale.

use log::debug;
use meshslim_core::{to_f64, Error, Point3d, Result, TriangleMesh};
use std::collections::HashMap;

/// Counters reported by a weld pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeldSummary {
    /// Vertices folded into another vertex
    pub merged_vertices: usize,
    /// Triangles dropped because two of their corners were merged
    pub collapsed_faces: usize,
    /// Vertices removed by compaction, merged ones included
    pub removed_vertices: usize,
}

/// Merge vertices closer than `merge_distance`.
///
/// The lowest index of each group is kept with its position unchanged.
/// Triangles are remapped, triangles that end up repeating a vertex are
/// dropped and unreferenced vertices are compacted. Surviving vertices are
/// pairwise at least `merge_distance` apart, so a second pass with the same
/// tolerance merges nothing.
///
/// # Errors
/// * [`Error::InvalidData`] for a non-positive or non-finite distance, or
///   non-finite coordinates
/// * [`Error::Degenerate`] when welding would collapse every triangle
pub fn weld_by_distance(mesh: &TriangleMesh, merge_distance: f32) -> Result<(TriangleMesh, WeldSummary)> {
    if !(merge_distance > 0.0) || !merge_distance.is_finite() {
        return Err(Error::InvalidData(format!(
            "merge distance must be positive and finite, got {}",
            merge_distance
        )));
    }
    let positions = finite_positions(mesh)?;
    let epsilon = merge_distance as f64;
    let cell_size = epsilon * 2.0;

    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    for (idx, p) in positions.iter().enumerate() {
        spatial_hash.entry(pos_to_cell(p, cell_size)).or_default().push(idx);
    }

    let mut remap: Vec<usize> = (0..positions.len()).collect();
    let mut merged = 0;

    for idx in 0..positions.len() {
        if remap[idx] != idx {
            continue;
        }
        let cell = pos_to_cell(&positions[idx], cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    let Some(candidates) = spatial_hash.get(&neighbor_cell) else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other] != other {
                            continue;
                        }
                        if (positions[idx] - positions[other]).norm() < epsilon {
                            remap[other] = idx;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    apply_remap(mesh, &remap, merged)
}

/// Number of decimal places equivalent to an absolute weld tolerance.
///
/// `digits = max(0, ceil(-log10(merge_distance / diagonal)))`, with 6 when
/// either input is non-positive or non-finite.
pub fn weld_digits(diagonal: f64, merge_distance: f64) -> u32 {
    if !(diagonal > 0.0) || !(merge_distance > 0.0) || !diagonal.is_finite() || !merge_distance.is_finite() {
        return 6;
    }
    let digits = (-(merge_distance / diagonal).log10()).ceil();
    if digits <= 0.0 {
        0
    } else {
        digits as u32
    }
}

/// Merge vertices whose coordinates are equal after rounding to `digits`
/// decimal places. The first occurrence of each rounded position is kept.
///
/// # Errors
/// * [`Error::InvalidData`] for non-finite coordinates
/// * [`Error::Degenerate`] when the rounding grid is too fine to be
///   represented for the coordinate range, or welding would collapse every
///   triangle
pub fn weld_by_precision(mesh: &TriangleMesh, digits: u32) -> Result<(TriangleMesh, WeldSummary)> {
    let positions = finite_positions(mesh)?;
    let scale = 10f64.powi(digits as i32);
    // keep keys well inside i64 so rounding never saturates
    const MAX_KEY: f64 = (1u64 << 62) as f64;

    let mut first: HashMap<(i64, i64, i64), usize> = HashMap::with_capacity(positions.len());
    let mut remap: Vec<usize> = (0..positions.len()).collect();
    let mut merged = 0;

    for (idx, p) in positions.iter().enumerate() {
        let scaled = [p.x * scale, p.y * scale, p.z * scale];
        if scaled.iter().any(|c| c.abs() >= MAX_KEY) {
            return Err(Error::Degenerate(format!(
                "{} decimal places exceed the precision available for coordinate {:?}",
                digits, p
            )));
        }
        let key = (
            scaled[0].round() as i64,
            scaled[1].round() as i64,
            scaled[2].round() as i64,
        );
        match first.get(&key) {
            Some(&rep) => {
                remap[idx] = rep;
                merged += 1;
            }
            None => {
                first.insert(key, idx);
            }
        }
    }

    apply_remap(mesh, &remap, merged)
}

fn finite_positions(mesh: &TriangleMesh) -> Result<Vec<Point3d>> {
    let positions: Vec<Point3d> = mesh.vertices().iter().map(to_f64).collect();
    if let Some(vi) = positions
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(Error::InvalidData(format!(
            "vertex {} has a non-finite coordinate",
            vi
        )));
    }
    Ok(positions)
}

fn apply_remap(mesh: &TriangleMesh, remap: &[usize], merged: usize) -> Result<(TriangleMesh, WeldSummary)> {
    let faces: Vec<[usize; 3]> = mesh
        .faces()
        .iter()
        .map(|f| [remap[f[0]], remap[f[1]], remap[f[2]]])
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();

    if faces.is_empty() {
        return Err(Error::Degenerate(format!(
            "welding collapsed all {} triangles",
            mesh.face_count()
        )));
    }

    let collapsed_faces = mesh.face_count() - faces.len();
    let mut welded = mesh.clone();
    welded.set_faces(faces);
    let removed_vertices = welded.remove_unreferenced_vertices();

    let summary = WeldSummary {
        merged_vertices: merged,
        collapsed_faces,
        removed_vertices,
    };
    debug!(
        "Weld merged {} vertices, dropped {} triangles, {} -> {} vertices",
        summary.merged_vertices,
        summary.collapsed_faces,
        mesh.vertex_count(),
        welded.vertex_count()
    );
    Ok((welded, summary))
}

/// Convert position to spatial hash cell.
fn pos_to_cell(pos: &Point3d, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}
