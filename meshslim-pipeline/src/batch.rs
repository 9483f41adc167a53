//! Batch optimization on a worker pool
//!
//! Each mesh is optimized independently on a rayon thread pool. A failure or
//! timeout affects only its own mesh, and results come back in input order.

use crate::config::OptimizationParams;
use crate::pipeline::optimize_with_deadline;
use crate::report::PipelineResult;
use log::{info, warn};
use meshslim_core::{Deadline, Error, Result, TriangleMesh};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    /// Worker count (None = one per available core)
    pub threads: Option<usize>,
    /// Wall-clock budget per mesh, measured from when a worker picks it up
    pub per_mesh_timeout: Option<Duration>,
}

impl BatchOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_mesh_timeout = Some(timeout);
        self
    }
}

/// Outcome for one named mesh
#[derive(Debug)]
pub struct BatchItem {
    pub name: String,
    pub result: Result<PipelineResult>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.result, Err(Error::Timeout(_)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures caused by the per-mesh timeout, included in `failed`
    pub timed_out: usize,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        items.iter().fold(Self::default(), |mut summary, item| {
            summary.total += 1;
            if item.is_ok() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
                if item.is_timeout() {
                    summary.timed_out += 1;
                }
            }
            summary
        })
    }
}

/// Runs the pipeline over many meshes with shared, read-only parameters.
#[derive(Debug)]
pub struct BatchRunner {
    params: OptimizationParams,
    options: BatchOptions,
    pool: ThreadPool,
}

impl BatchRunner {
    /// # Errors
    ///
    /// Fails for invalid parameters, a zero thread count or when the thread
    /// pool cannot be created.
    pub fn new(params: OptimizationParams, options: BatchOptions) -> Result<Self> {
        params.validate()?;

        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("meshslim-{}", index));
        if let Some(threads) = options.threads {
            if threads == 0 {
                return Err(Error::Config("batch thread count must be > 0".to_string()));
            }
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))?;

        Ok(Self {
            params,
            options,
            pool,
        })
    }

    pub fn params(&self) -> &OptimizationParams {
        &self.params
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Optimize every mesh. Results keep the input order.
    pub fn run(&self, meshes: Vec<(String, TriangleMesh)>) -> Vec<BatchItem> {
        let items: Vec<BatchItem> = self.pool.install(|| {
            meshes
                .into_par_iter()
                .map(|(name, mesh)| self.process(name, mesh))
                .collect()
        });

        let summary = BatchSummary::from_items(&items);
        info!(
            "Batch finished: {} meshes, {} succeeded, {} failed ({} timed out)",
            summary.total, summary.succeeded, summary.failed, summary.timed_out
        );
        items
    }

    fn process(&self, name: String, mesh: TriangleMesh) -> BatchItem {
        let deadline = Deadline::from_timeout(self.options.per_mesh_timeout);
        let result = optimize_with_deadline(mesh, &self.params, deadline);
        if let Err(e) = &result {
            warn!("Mesh '{}' failed: {}", name, e);
        }
        BatchItem { name, result }
    }
}
