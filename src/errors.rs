//! Error taxonomy for the import pipeline.
//!
//! Record-level problems (bad geometry, unmappable attributes) are counted
//! and recovered locally, never raised. Batch-level problems retry and then
//! degrade to partial failure. County-level problems are isolated from
//! sibling counties. Swap-level problems block publication.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading a source directory or file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No file with a recognized extension was found in the directory.
    #[error("no recognized source format in {0} (expected .shp, .csv, or .geojson)")]
    UnrecognizedFormat(PathBuf),

    /// A single file failed to parse. Callers skip the file and continue
    /// with siblings in the same directory.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A per-record transformation failure. Counted against the county's
/// error budget, never propagated on its own.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("record has no parcel id")]
    MissingParcelId,

    #[error("feature computation failed: {0}")]
    Feature(String),
}

/// Errors that terminate a county run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Cumulative transform + load errors exceeded the configured
    /// threshold; the source file is likely corrupt.
    #[error("too many transform errors: {errors} (threshold {threshold})")]
    TooManyTransformErrors { errors: usize, threshold: usize },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The run was cancelled before completion (shutdown requested).
    #[error("county run cancelled")]
    Cancelled,
}

/// Errors from the staging -> production swap.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Staging is empty or too small relative to production. Production
    /// is left untouched; the operator must investigate.
    #[error(
        "swap precondition failed: staging has {staging} records, \
         production has {production} (minimum fraction {min_fraction})"
    )]
    Precondition {
        staging: u64,
        production: u64,
        min_fraction: f64,
    },

    #[error("store error during swap: {0}")]
    Store(#[from] rusqlite::Error),
}
