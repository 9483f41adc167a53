//! Optimization parameters

use meshslim_algorithms::SmoothOptions;
use meshslim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable of the optimization pipeline.
///
/// Fields missing from a JSON document take their defaults.
///
/// ```
/// use meshslim_pipeline::OptimizationParams;
///
/// let params = OptimizationParams::default().with_target_faces(500);
/// assert_eq!(params.simplify_target_faces, Some(500));
/// assert_eq!(params.taubin_iters, 20);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationParams {
    /// Triangles with area at or below this are dropped (0 disables).
    pub min_face_area: f32,

    /// Early weld distance (0 disables).
    pub merge_distance: f32,

    /// Fraction of triangles to keep, in (0, 1).
    pub simplify_keep_ratio: Option<f32>,

    /// Absolute triangle budget. Overrides the keep ratio.
    pub simplify_target_faces: Option<usize>,

    /// Taubin iterations (0 disables smoothing). Each one is a λ pass
    /// followed by a μ pass.
    pub taubin_iters: usize,

    pub taubin_lambda: f32,

    pub taubin_mu: f32,

    /// Fill holes and orient faces outward.
    pub ensure_watertight: bool,

    /// Rotate Z-up input to Y-up.
    pub fix_coordinate: bool,

    /// Holes with more boundary edges than this are left open. The default
    /// of 1000 closes large scan holes too; set 4 to close only triangle and
    /// quad holes.
    pub max_hole_edges: usize,
}

impl Default for OptimizationParams {
    fn default() -> Self {
        Self {
            min_face_area: 1e-6,
            merge_distance: 1e-5,
            simplify_keep_ratio: None,
            simplify_target_faces: None,
            taubin_iters: 20,
            taubin_lambda: 0.5,
            taubin_mu: -0.53,
            ensure_watertight: true,
            fix_coordinate: true,
            max_hole_edges: 1000,
        }
    }
}

impl OptimizationParams {
    #[must_use]
    pub fn with_min_face_area(mut self, min_face_area: f32) -> Self {
        self.min_face_area = min_face_area;
        self
    }

    #[must_use]
    pub fn with_merge_distance(mut self, merge_distance: f32) -> Self {
        self.merge_distance = merge_distance;
        self
    }

    #[must_use]
    pub fn with_target_faces(mut self, target_faces: usize) -> Self {
        self.simplify_target_faces = Some(target_faces);
        self
    }

    #[must_use]
    pub fn with_keep_ratio(mut self, keep_ratio: f32) -> Self {
        self.simplify_keep_ratio = Some(keep_ratio);
        self
    }

    /// Sets the Taubin iteration count and step factors.
    #[must_use]
    pub fn with_taubin(mut self, iterations: usize, lambda: f32, mu: f32) -> Self {
        self.taubin_iters = iterations;
        self.taubin_lambda = lambda;
        self.taubin_mu = mu;
        self
    }

    #[must_use]
    pub fn with_watertight(mut self, ensure_watertight: bool) -> Self {
        self.ensure_watertight = ensure_watertight;
        self
    }

    #[must_use]
    pub fn with_fix_coordinate(mut self, fix_coordinate: bool) -> Self {
        self.fix_coordinate = fix_coordinate;
        self
    }

    #[must_use]
    pub fn with_max_hole_edges(mut self, max_hole_edges: usize) -> Self {
        self.max_hole_edges = max_hole_edges;
        self
    }

    /// Smoothing options derived from the Taubin fields
    pub fn smooth_options(&self) -> SmoothOptions {
        SmoothOptions::default()
            .with_iterations(self.taubin_iters)
            .with_lambda(self.taubin_lambda)
            .with_mu(self.taubin_mu)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for negative or non-finite tolerances, a
    /// keep ratio outside (0, 1), a zero triangle target or non-finite
    /// smoothing factors. The smoothing factors are otherwise checked by the
    /// smoother itself, which falls back instead of failing.
    pub fn validate(&self) -> Result<()> {
        if !self.min_face_area.is_finite() || self.min_face_area < 0.0 {
            return Err(Error::Config(format!(
                "min_face_area must be finite and >= 0, got {}",
                self.min_face_area
            )));
        }
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            return Err(Error::Config(format!(
                "merge_distance must be finite and >= 0, got {}",
                self.merge_distance
            )));
        }
        if let Some(ratio) = self.simplify_keep_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(Error::Config(format!(
                    "simplify_keep_ratio must be in (0, 1), got {}",
                    ratio
                )));
            }
        }
        if self.simplify_target_faces == Some(0) {
            return Err(Error::Config("simplify_target_faces must be > 0".to_string()));
        }
        if !self.taubin_lambda.is_finite() || !self.taubin_mu.is_finite() {
            return Err(Error::Config(format!(
                "taubin factors must be finite, got lambda {} mu {}",
                self.taubin_lambda, self.taubin_mu
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid parameter JSON: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize parameters: {}", e)))
    }

    /// Loads and validates parameters from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}
