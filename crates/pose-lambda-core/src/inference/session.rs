//! ONNX Runtime session construction.

use std::path::Path;

use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::debug;

/// Loads an ONNX model into a session with full graph optimization.
///
/// `threads` limits intra-op parallelism; `0` leaves the runtime default.
///
/// # Errors
///
/// Returns an error if the file is missing or is not a valid model.
pub fn build_session(path: &Path, threads: usize) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!("Model file not found: {}", path.display());
    }

    debug!("Loading ONNX model from {}", path.display());

    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    if threads > 0 {
        builder = builder.with_intra_threads(threads)?;
    }

    builder
        .commit_from_file(path)
        .with_context(|| format!("Failed to load ONNX model: {}", path.display()))
}
